//! Head-turn detection from the horizontal skin centroid.
//!
//! When the head turns, the visible skin area slides sideways in the frame.
//! The mean x of skin pixels over the first three samples fixes a baseline;
//! a shift past the trigger is the turn, and coming back under half of it is
//! the return to center.

use std::collections::VecDeque;

use super::{
    mean, pending_score, push_bounded, ChallengeAnalyzer, ChallengeProgress, ChallengeType,
    GESTURE_SCORE,
};
use crate::config::LivenessConfig;
use crate::frame::Frame;
use crate::skin::skin_centroid_x;

const BASELINE_SAMPLES: usize = 3;

#[derive(Debug, Clone)]
pub struct HeadTurnDetector {
    trigger: f32,
    release: f32,
    capacity: usize,
    history: VecDeque<f32>,
    samples: usize,
    baseline: Option<f32>,
    head_turn_detected: bool,
    peak_shift: f32,
}

impl HeadTurnDetector {
    pub fn new(config: &LivenessConfig) -> Self {
        Self {
            trigger: config.head_shift_trigger,
            release: config.head_shift_release,
            capacity: config.history_capacity.max(BASELINE_SAMPLES),
            history: VecDeque::with_capacity(config.history_capacity),
            samples: 0,
            baseline: None,
            head_turn_detected: false,
            peak_shift: 0.0,
        }
    }

    pub fn head_turn_detected(&self) -> bool {
        self.head_turn_detected
    }

    /// Largest centroid shift (pixels) seen while turned.
    pub fn peak_shift(&self) -> f32 {
        self.peak_shift
    }

    pub fn baseline(&self) -> Option<f32> {
        self.baseline
    }
}

impl ChallengeAnalyzer for HeadTurnDetector {
    fn challenge_type(&self) -> ChallengeType {
        ChallengeType::HeadTurn
    }

    fn observe(&mut self, frame: &Frame) -> ChallengeProgress {
        let Some(centroid) = skin_centroid_x(frame) else {
            tracing::debug!(sequence = frame.sequence(), "no skin pixels in frame");
            return ChallengeProgress::Pending {
                score: pending_score(self.samples),
                message: "Keep your face in view",
            };
        };

        push_bounded(&mut self.history, self.capacity, centroid);
        self.samples += 1;

        if self.baseline.is_none() && self.history.len() >= BASELINE_SAMPLES {
            self.baseline = mean(self.history.iter().take(BASELINE_SAMPLES));
        }
        let Some(baseline) = self.baseline else {
            return ChallengeProgress::Pending {
                score: pending_score(self.samples),
                message: ChallengeType::HeadTurn.instruction(),
            };
        };

        let shift = (centroid - baseline).abs();
        tracing::debug!(centroid, baseline, shift, turned = self.head_turn_detected, "head sample");

        if !self.head_turn_detected && shift >= self.trigger {
            self.head_turn_detected = true;
            self.peak_shift = shift;
            tracing::info!(shift, "head turn detected");
            return ChallengeProgress::Detected {
                score: GESTURE_SCORE,
                message: "Head turn detected, now return to center",
            };
        }

        if self.head_turn_detected {
            self.peak_shift = self.peak_shift.max(shift);
            if shift < self.release {
                tracing::debug!(peak_shift = self.peak_shift, "head returned to center");
                return ChallengeProgress::Confirmed;
            }
            return ChallengeProgress::Pending {
                score: GESTURE_SCORE,
                message: "Now return to center",
            };
        }

        ChallengeProgress::Pending {
            score: pending_score(self.samples),
            message: ChallengeType::HeadTurn.instruction(),
        }
    }

    fn reset(&mut self) {
        self.history.clear();
        self.samples = 0;
        self.baseline = None;
        self.head_turn_detected = false;
        self.peak_shift = 0.0;
    }
}
