use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tunables for the liveness session and its analyzers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    /// Capacity of the rolling frame buffer.
    pub buffer_capacity: usize,
    /// Frames required before passive motion analysis runs.
    pub min_frames: usize,
    /// Lower bound (inclusive) of the natural motion band.
    pub motion_min: f32,
    /// Upper bound (exclusive) of the natural motion band.
    pub motion_max: f32,
    /// Fraction of frame pairs inside the band that confirms passive liveness.
    pub natural_ratio_threshold: f32,
    /// Relative eye-region brightness drop that counts as a blink.
    pub blink_drop_trigger: f32,
    /// Drop below which the eyes are considered open again.
    pub blink_drop_release: f32,
    /// Skin centroid shift (pixels) that counts as a head turn.
    pub head_shift_trigger: f32,
    /// Shift below which the head is considered back at center.
    pub head_shift_release: f32,
    /// Cap on the brightness / centroid sample histories.
    pub history_capacity: usize,
    /// Longer-side size of sampled liveness frames. The head-shift
    /// thresholds are in pixels of this working size.
    pub frame_max_dim: u32,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 10,
            min_frames: 4,
            motion_min: 1.5,
            motion_max: 45.0,
            natural_ratio_threshold: 0.6,
            blink_drop_trigger: 0.10,
            blink_drop_release: 0.05,
            head_shift_trigger: 7.0,
            head_shift_release: 3.5,
            history_capacity: 10,
            frame_max_dim: 160,
        }
    }
}

impl LivenessConfig {
    /// Load from `LIVECHECK_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            buffer_capacity: env_parse("LIVECHECK_BUFFER_CAPACITY", d.buffer_capacity),
            min_frames: env_parse("LIVECHECK_MIN_FRAMES", d.min_frames),
            motion_min: env_parse("LIVECHECK_MOTION_MIN", d.motion_min),
            motion_max: env_parse("LIVECHECK_MOTION_MAX", d.motion_max),
            natural_ratio_threshold: env_parse(
                "LIVECHECK_NATURAL_RATIO",
                d.natural_ratio_threshold,
            ),
            blink_drop_trigger: env_parse("LIVECHECK_BLINK_DROP_TRIGGER", d.blink_drop_trigger),
            blink_drop_release: env_parse("LIVECHECK_BLINK_DROP_RELEASE", d.blink_drop_release),
            head_shift_trigger: env_parse("LIVECHECK_HEAD_SHIFT_TRIGGER", d.head_shift_trigger),
            head_shift_release: env_parse("LIVECHECK_HEAD_SHIFT_RELEASE", d.head_shift_release),
            history_capacity: env_parse("LIVECHECK_HISTORY_CAPACITY", d.history_capacity),
            frame_max_dim: env_parse("LIVECHECK_FRAME_MAX_DIM", d.frame_max_dim),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer_capacity < 2 {
            return Err(invalid("buffer_capacity", "must be at least 2"));
        }
        if self.min_frames < 2 || self.min_frames > self.buffer_capacity {
            return Err(invalid(
                "min_frames",
                format!("must be within 2..={}", self.buffer_capacity),
            ));
        }
        if !(self.motion_min >= 0.0 && self.motion_min < self.motion_max) {
            return Err(invalid("motion_min", "must be non-negative and below motion_max"));
        }
        if !(0.0..=1.0).contains(&self.natural_ratio_threshold) {
            return Err(invalid("natural_ratio_threshold", "must be within 0..=1"));
        }
        if !(self.blink_drop_release >= 0.0 && self.blink_drop_release < self.blink_drop_trigger)
        {
            return Err(invalid(
                "blink_drop_release",
                "must be non-negative and below blink_drop_trigger",
            ));
        }
        if !(self.head_shift_release >= 0.0 && self.head_shift_release < self.head_shift_trigger)
        {
            return Err(invalid(
                "head_shift_release",
                "must be non-negative and below head_shift_trigger",
            ));
        }
        if self.history_capacity < 3 {
            return Err(invalid("history_capacity", "must be at least 3"));
        }
        if self.frame_max_dim == 0 {
            return Err(invalid("frame_max_dim", "must be positive"));
        }
        Ok(())
    }
}

/// Tunables for the skin-histogram face matcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Longer-side size images are downscaled to before analysis.
    pub max_dim: u32,
    /// Top fraction of the image treated as the face region.
    pub face_region_fraction: f32,
    /// Minimum skin pixels per image for a comparison to be attempted.
    pub min_skin_pixels: usize,
    /// Similarity percentage at or above which faces match.
    pub match_threshold: u8,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            max_dim: 200,
            face_region_fraction: 0.6,
            min_skin_pixels: 100,
            match_threshold: 55,
        }
    }
}

impl MatchConfig {
    /// Load from `LIVECHECK_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            max_dim: env_parse("LIVECHECK_MATCH_MAX_DIM", d.max_dim),
            face_region_fraction: env_parse("LIVECHECK_FACE_REGION", d.face_region_fraction),
            min_skin_pixels: env_parse("LIVECHECK_MIN_SKIN_PIXELS", d.min_skin_pixels),
            match_threshold: env_parse("LIVECHECK_MATCH_THRESHOLD", d.match_threshold),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_dim == 0 {
            return Err(invalid("max_dim", "must be positive"));
        }
        if !(self.face_region_fraction > 0.0 && self.face_region_fraction <= 1.0) {
            return Err(invalid("face_region_fraction", "must be within (0, 1]"));
        }
        if self.match_threshold > 100 {
            return Err(invalid("match_threshold", "must be a percentage"));
        }
        Ok(())
    }
}

/// Complete engine configuration, as read from a TOML file.
///
/// ```toml
/// [liveness]
/// min_frames = 5
///
/// [matching]
/// match_threshold = 60
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub liveness: LivenessConfig,
    pub matching: MatchConfig,
}

impl EngineConfig {
    /// Environment-only configuration.
    pub fn from_env() -> Self {
        Self {
            liveness: LivenessConfig::from_env(),
            matching: MatchConfig::from_env(),
        }
    }

    /// Parse and validate a TOML document. Missing fields take defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.liveness.validate()?;
        self.matching.validate()
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
