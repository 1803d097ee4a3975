use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while turning captured pixels into a [`Frame`](crate::Frame).
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("frame has zero dimension: {width}x{height}")]
    ZeroDimension { width: u32, height: u32 },

    #[error("frame buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSize { expected: usize, actual: usize },

    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("failed to open image: {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Errors raised while loading or validating engine configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
