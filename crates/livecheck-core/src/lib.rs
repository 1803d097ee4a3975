//! livecheck-core: client-side liveness and identity-verification engine.
//!
//! Everything here runs on ordinary 2D camera frames with no model files and
//! no server round-trip:
//!
//! - [`Session`] sequences passive motion analysis and one active challenge
//!   (blink or head turn) over a stream of [`Frame`]s.
//! - [`compare_faces`] correlates skin-tone colour histograms of a captured
//!   image and an enrolled reference.
//!
//! Both are advisory. They gate a UX flow and are not an identity proof.

pub mod challenge;
pub mod config;
pub mod error;
pub mod frame;
pub mod liveness;
pub mod matcher;
pub mod motion;
pub mod skin;

#[cfg(test)]
pub(crate) mod testutil;

pub use challenge::{ChallengeAnalyzer, ChallengeProgress, ChallengeType};
pub use config::{EngineConfig, LivenessConfig, MatchConfig};
pub use error::{ConfigError, FrameError};
pub use frame::{decode_frame, open_frame, sample_image, Frame};
pub use liveness::{LivenessResult, LivenessStatus, Session};
pub use matcher::{
    compare_face_bytes, compare_face_bytes_with, compare_faces, compare_faces_with,
    FaceMatchResult, SkinHistogram,
};
pub use motion::{frame_difference, MotionAnalysis, MotionVerdict};
pub use skin::{is_skin, skin_centroid_x};
