//! Active liveness challenges.
//!
//! After passive motion is confirmed the session asks the user for one
//! gesture. Both detectors are one-shot: the sub-gesture flag (eyes closed,
//! head turned) is set once and only cleared by [`ChallengeAnalyzer::reset`],
//! so oscillating noise cannot re-trigger the confirm branch. A challenge is
//! confirmed when the gesture is followed by a return to baseline.

mod blink;
mod head_turn;

use std::collections::VecDeque;
use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::LivenessConfig;
use crate::frame::Frame;

pub use blink::{eye_region, eye_region_brightness, BlinkDetector, Region};
pub use head_turn::HeadTurnDetector;

/// Score reported once the gesture itself has been seen.
pub const GESTURE_SCORE: u8 = 70;

const PENDING_BASE_SCORE: u8 = 40;
const PENDING_MAX_SCORE: u8 = 60;

/// Which gesture the user is asked to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeType {
    Blink,
    HeadTurn,
}

impl ChallengeType {
    /// Uniform choice between the two challenges.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        if rng.gen_bool(0.5) {
            ChallengeType::Blink
        } else {
            ChallengeType::HeadTurn
        }
    }

    /// Instruction shown to the user for this challenge.
    pub fn instruction(self) -> &'static str {
        match self {
            ChallengeType::Blink => "Blink your eyes naturally",
            ChallengeType::HeadTurn => "Slowly turn your head to one side",
        }
    }

    /// Fresh analyzer for this challenge.
    pub fn analyzer(self, config: &LivenessConfig) -> Box<dyn ChallengeAnalyzer + Send> {
        match self {
            ChallengeType::Blink => Box::new(BlinkDetector::new(config)),
            ChallengeType::HeadTurn => Box::new(HeadTurnDetector::new(config)),
        }
    }
}

impl fmt::Display for ChallengeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChallengeType::Blink => f.write_str("blink"),
            ChallengeType::HeadTurn => f.write_str("head_turn"),
        }
    }
}

/// Per-frame outcome of a challenge analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeProgress {
    /// Still waiting for (or in the middle of) the gesture.
    Pending { score: u8, message: &'static str },
    /// The gesture was seen on this frame.
    Detected { score: u8, message: &'static str },
    /// Gesture followed by a return to baseline.
    Confirmed,
}

/// A gesture detector fed one frame at a time.
pub trait ChallengeAnalyzer {
    fn challenge_type(&self) -> ChallengeType;

    /// Analyse the newest frame.
    fn observe(&mut self, frame: &Frame) -> ChallengeProgress;

    /// Clear all history and gesture flags.
    fn reset(&mut self);
}

/// Progress score before the gesture: grows with samples, capped.
fn pending_score(samples: usize) -> u8 {
    let grown = usize::from(PENDING_BASE_SCORE).saturating_add(samples.saturating_mul(2));
    grown.min(usize::from(PENDING_MAX_SCORE)) as u8
}

/// Push onto a bounded history, evicting the oldest sample.
fn push_bounded(history: &mut VecDeque<f32>, capacity: usize, value: f32) {
    history.push_back(value);
    while history.len() > capacity.max(1) {
        history.pop_front();
    }
}

fn mean<'a>(values: impl IntoIterator<Item = &'a f32>) -> Option<f32> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0f32, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f32)
    }
}
