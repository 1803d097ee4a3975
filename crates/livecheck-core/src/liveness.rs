//! Liveness session: passive motion followed by one active challenge.
//!
//! The host feeds frames one at a time through [`Session::add_frame`]. The
//! session keeps the last few frames, waits until inter-frame motion looks
//! like a live subject, then hands each frame to the selected challenge
//! until the gesture and its return to baseline are seen.
//!
//! ```text
//! Waiting -> Analyzing -> Challenge -> Alive
//!               |  ^
//!               v  |
//!            Suspicious
//! ```
//!
//! `Suspicious` is not terminal: if motion becomes natural again the session
//! moves on. `Alive` is sticky for the lifetime of the session.
//!
//! # Threat Coverage
//!
//! - **Blocks:** printed photographs, paused screens, casual replay that
//!   does not respond to the requested gesture.
//! - **Does not block:** deepfake or live-puppeted video, 3D masks. The
//!   session is advisory and gates a UX flow, not a cryptographic proof.

use std::collections::VecDeque;

use rand::Rng;
use serde::Serialize;

use crate::challenge::{ChallengeAnalyzer, ChallengeProgress, ChallengeType};
use crate::config::LivenessConfig;
use crate::error::ConfigError;
use crate::frame::Frame;
use crate::motion::{MotionAnalysis, MotionVerdict};

/// Score reported once liveness is confirmed.
const ALIVE_SCORE: u8 = 100;
const STATIC_SCORE: u8 = 10;
const UNSTABLE_SCORE: u8 = 25;

/// Coarse state reported to the host after every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LivenessStatus {
    Waiting,
    Analyzing,
    Challenge,
    Alive,
    Suspicious,
}

/// Snapshot returned for every submitted frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LivenessResult {
    pub status: LivenessStatus,
    /// Advisory progress, 0-100. Not used for any decision.
    pub score: u8,
    pub message: String,
    /// Frames submitted since creation or the last reset.
    pub frames_analyzed: usize,
    pub challenge_type: Option<ChallengeType>,
    pub challenge_instruction: Option<String>,
}

/// One verification attempt.
///
/// Not internally synchronised; use from one thread at a time.
pub struct Session {
    config: LivenessConfig,
    challenge_type: ChallengeType,
    challenge: Box<dyn ChallengeAnalyzer + Send>,
    frames: VecDeque<Frame>,
    frames_analyzed: usize,
    passive_confirmed: bool,
    confirmed_alive: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Default configuration, challenge chosen from the thread RNG.
    pub fn new() -> Self {
        Self::build(
            LivenessConfig::default(),
            ChallengeType::random(&mut rand::thread_rng()),
        )
    }

    /// Challenge chosen from the thread RNG.
    pub fn with_config(config: LivenessConfig) -> Result<Self, ConfigError> {
        Self::with_rng(config, &mut rand::thread_rng())
    }

    /// Challenge chosen uniformly from `rng`.
    pub fn with_rng<R: Rng + ?Sized>(
        config: LivenessConfig,
        rng: &mut R,
    ) -> Result<Self, ConfigError> {
        Self::with_challenge(config, ChallengeType::random(rng))
    }

    /// Fixed challenge type.
    ///
    /// Rejects configurations that could never confirm, such as a sample
    /// history too short to hold a blink baseline.
    pub fn with_challenge(
        config: LivenessConfig,
        challenge_type: ChallengeType,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config, challenge_type))
    }

    fn build(config: LivenessConfig, challenge_type: ChallengeType) -> Self {
        let challenge = challenge_type.analyzer(&config);
        tracing::debug!(challenge = %challenge_type, "liveness session created");
        Self {
            frames: VecDeque::with_capacity(config.buffer_capacity),
            config,
            challenge_type,
            challenge,
            frames_analyzed: 0,
            passive_confirmed: false,
            confirmed_alive: false,
        }
    }

    pub fn challenge_type(&self) -> ChallengeType {
        self.challenge_type
    }

    pub fn config(&self) -> &LivenessConfig {
        &self.config
    }

    pub fn frames_analyzed(&self) -> usize {
        self.frames_analyzed
    }

    pub fn buffered_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn is_passive_confirmed(&self) -> bool {
        self.passive_confirmed
    }

    pub fn is_alive(&self) -> bool {
        self.confirmed_alive
    }

    /// Submit the next captured frame.
    pub fn add_frame(&mut self, frame: Frame) -> LivenessResult {
        if let Some(last) = self.frames.back() {
            if !last.same_size(&frame) {
                tracing::warn!(
                    from_w = last.width(),
                    from_h = last.height(),
                    to_w = frame.width(),
                    to_h = frame.height(),
                    "frame size changed, dropping buffered frames"
                );
                self.frames.clear();
            }
        }

        self.frames.push_back(frame);
        while self.frames.len() > self.config.buffer_capacity.max(1) {
            self.frames.pop_front();
        }
        self.frames_analyzed += 1;

        if self.confirmed_alive {
            return self.alive_result();
        }

        if !self.passive_confirmed {
            let motion = MotionAnalysis::over(&self.frames, &self.config);
            match motion.verdict {
                MotionVerdict::Waiting => {
                    return self.result(
                        LivenessStatus::Waiting,
                        0,
                        "Hold still, collecting frames",
                    );
                }
                MotionVerdict::Static => {
                    return self.result(
                        LivenessStatus::Suspicious,
                        STATIC_SCORE,
                        "No motion detected, this looks like a static photo",
                    );
                }
                MotionVerdict::Unstable => {
                    return self.result(
                        LivenessStatus::Analyzing,
                        UNSTABLE_SCORE,
                        "Too much movement, please hold the camera steady",
                    );
                }
                MotionVerdict::Inconclusive => {
                    return self.result(
                        LivenessStatus::Analyzing,
                        motion.progress_score(),
                        "Analyzing natural movement",
                    );
                }
                MotionVerdict::Natural => {
                    self.passive_confirmed = true;
                    tracing::info!(
                        avg_motion = motion.avg_motion,
                        natural_ratio = motion.natural_ratio,
                        challenge = %self.challenge_type,
                        "passive motion confirmed"
                    );
                }
            }
        }

        let Some(latest) = self.frames.back() else {
            return self.result(LivenessStatus::Waiting, 0, "Hold still, collecting frames");
        };

        match self.challenge.observe(latest) {
            ChallengeProgress::Confirmed => {
                self.confirmed_alive = true;
                tracing::info!(
                    challenge = %self.challenge_type,
                    frames = self.frames_analyzed,
                    "liveness confirmed"
                );
                self.alive_result()
            }
            ChallengeProgress::Detected { score, message }
            | ChallengeProgress::Pending { score, message } => {
                self.challenge_result(score, message)
            }
        }
    }

    /// Clear all state for a retry. The challenge type is kept.
    pub fn reset(&mut self) {
        self.frames.clear();
        self.frames_analyzed = 0;
        self.passive_confirmed = false;
        self.confirmed_alive = false;
        self.challenge.reset();
        tracing::debug!(challenge = %self.challenge_type, "liveness session reset");
    }

    fn result(&self, status: LivenessStatus, score: u8, message: &str) -> LivenessResult {
        LivenessResult {
            status,
            score,
            message: message.to_string(),
            frames_analyzed: self.frames_analyzed,
            challenge_type: None,
            challenge_instruction: None,
        }
    }

    fn challenge_result(&self, score: u8, message: &str) -> LivenessResult {
        LivenessResult {
            status: LivenessStatus::Challenge,
            score,
            message: message.to_string(),
            frames_analyzed: self.frames_analyzed,
            challenge_type: Some(self.challenge_type),
            challenge_instruction: Some(self.challenge_type.instruction().to_string()),
        }
    }

    fn alive_result(&self) -> LivenessResult {
        LivenessResult {
            status: LivenessStatus::Alive,
            score: ALIVE_SCORE,
            message: "Liveness confirmed".to_string(),
            frames_analyzed: self.frames_analyzed,
            challenge_type: Some(self.challenge_type),
            challenge_instruction: None,
        }
    }
}
