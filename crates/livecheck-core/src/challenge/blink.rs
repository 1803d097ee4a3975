//! Blink detection from eye-region brightness.
//!
//! Without a landmark model there is no eye position, so a fixed band of the
//! frame stands in for it: the horizontal center 60% between 22% and 40% of
//! the height, where the eyes sit in a head-and-shoulders framing. Closed
//! eyelids darken that band relative to the running baseline.

use std::collections::VecDeque;

use super::{
    mean, pending_score, push_bounded, ChallengeAnalyzer, ChallengeProgress, ChallengeType,
    GESTURE_SCORE,
};
use crate::config::LivenessConfig;
use crate::frame::Frame;

const REGION_LEFT: f32 = 0.20;
const REGION_RIGHT: f32 = 0.80;
const REGION_TOP: f32 = 0.22;
const REGION_BOTTOM: f32 = 0.40;

/// Half-open pixel rectangle `[x0, x1) x [y0, y1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x0: u32,
    pub x1: u32,
    pub y0: u32,
    pub y1: u32,
}

impl Region {
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }
}

/// Eye band for a frame of the given size. Always at least one pixel.
pub fn eye_region(width: u32, height: u32) -> Region {
    let span = |len: u32, lo: f32, hi: f32| {
        let start = (len as f32 * lo) as u32;
        let end = ((len as f32 * hi) as u32).max(start + 1).min(len.max(1));
        (start.min(end.saturating_sub(1)), end)
    };
    let (x0, x1) = span(width, REGION_LEFT, REGION_RIGHT);
    let (y0, y1) = span(height, REGION_TOP, REGION_BOTTOM);
    Region { x0, x1, y0, y1 }
}

/// Mean luma (BT.601) over the eye band. `0.0` if the band is empty.
pub fn eye_region_brightness(frame: &Frame) -> f32 {
    let region = eye_region(frame.width(), frame.height());
    let mut sum = 0.0f64;
    let mut count = 0u64;
    for y in region.y0..region.y1.min(frame.height()) {
        for x in region.x0..region.x1.min(frame.width()) {
            let (r, g, b) = frame.pixel(x, y);
            sum += 0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b);
            count += 1;
        }
    }
    if count == 0 {
        return 0.0;
    }
    (sum / count as f64) as f32
}

/// Watches eye-region brightness for a dip and recovery.
#[derive(Debug, Clone)]
pub struct BlinkDetector {
    trigger: f32,
    release: f32,
    capacity: usize,
    history: VecDeque<f32>,
    samples: usize,
    blink_detected: bool,
}

impl BlinkDetector {
    pub fn new(config: &LivenessConfig) -> Self {
        Self {
            trigger: config.blink_drop_trigger,
            release: config.blink_drop_release,
            capacity: config.history_capacity,
            history: VecDeque::with_capacity(config.history_capacity),
            samples: 0,
            blink_detected: false,
        }
    }

    pub fn blink_detected(&self) -> bool {
        self.blink_detected
    }

    /// Relative drop of the newest sample against the baseline, which is the
    /// mean of every sample except the last two. `None` until three samples.
    fn current_drop(&self) -> Option<f32> {
        let len = self.history.len();
        if len < 3 {
            return None;
        }
        let current = self.history[len - 1];
        let baseline = mean(self.history.iter().take(len - 2))?;
        if baseline <= 0.0 {
            return Some(0.0);
        }
        Some((baseline - current) / baseline)
    }
}

impl ChallengeAnalyzer for BlinkDetector {
    fn challenge_type(&self) -> ChallengeType {
        ChallengeType::Blink
    }

    fn observe(&mut self, frame: &Frame) -> ChallengeProgress {
        let brightness = eye_region_brightness(frame);
        push_bounded(&mut self.history, self.capacity, brightness);
        self.samples += 1;

        let Some(drop) = self.current_drop() else {
            return ChallengeProgress::Pending {
                score: pending_score(self.samples),
                message: ChallengeType::Blink.instruction(),
            };
        };

        tracing::debug!(brightness, drop, blink_detected = self.blink_detected, "blink sample");

        if !self.blink_detected && drop >= self.trigger {
            self.blink_detected = true;
            tracing::info!(drop, "blink detected");
            return ChallengeProgress::Detected {
                score: GESTURE_SCORE,
                message: "Blink detected, now open your eyes",
            };
        }

        if self.blink_detected {
            if drop < self.release {
                return ChallengeProgress::Confirmed;
            }
            return ChallengeProgress::Pending {
                score: GESTURE_SCORE,
                message: "Open your eyes",
            };
        }

        ChallengeProgress::Pending {
            score: pending_score(self.samples),
            message: ChallengeType::Blink.instruction(),
        }
    }

    fn reset(&mut self) {
        self.history.clear();
        self.samples = 0;
        self.blink_detected = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    fn feed(detector: &mut BlinkDetector, levels: &[u8]) -> Vec<ChallengeProgress> {
        levels
            .iter()
            .map(|&level| detector.observe(&testutil::eye_frame(160, 120, false, level)))
            .collect()
    }

    #[test]
    fn test_eye_region_geometry() {
        let region = eye_region(160, 120);
        assert_eq!(region, Region { x0: 32, x1: 128, y0: 26, y1: 48 });
    }

    #[test]
    fn test_eye_region_never_empty() {
        for (w, h) in [(1, 1), (2, 3), (5, 1), (3, 2)] {
            let region = eye_region(w, h);
            assert!(region.x1 > region.x0, "{w}x{h}");
            assert!(region.y1 > region.y0, "{w}x{h}");
            assert!(region.x1 <= w && region.y1 <= h);
        }
    }

    #[test]
    fn test_brightness_of_grey_band() {
        let frame = testutil::eye_frame(160, 120, false, 200);
        assert!((eye_region_brightness(&frame) - 200.0).abs() < 1e-3);
    }

    #[test]
    fn test_brightness_ignores_outside_band() {
        let a = testutil::eye_frame(160, 120, false, 90);
        let b = testutil::eye_frame(160, 120, true, 90);
        assert!((eye_region_brightness(&a) - eye_region_brightness(&b)).abs() < 1e-3);
    }

    #[test]
    fn test_warmup_is_pending() {
        let mut detector = BlinkDetector::new(&LivenessConfig::default());
        let steps = feed(&mut detector, &[200, 200]);
        assert!(steps
            .iter()
            .all(|s| matches!(s, ChallengeProgress::Pending { .. })));
    }

    #[test]
    fn test_dip_then_recovery_confirms() {
        let mut detector = BlinkDetector::new(&LivenessConfig::default());
        let steps = feed(&mut detector, &[200, 200, 200, 150, 200]);
        assert!(matches!(
            steps[3],
            ChallengeProgress::Detected { score: GESTURE_SCORE, .. }
        ));
        assert!(detector.blink_detected());
        assert_eq!(steps[4], ChallengeProgress::Confirmed);
    }

    #[test]
    fn test_small_dip_is_ignored() {
        let mut detector = BlinkDetector::new(&LivenessConfig::default());
        // 5% drop stays under the 10% trigger
        let steps = feed(&mut detector, &[200, 200, 200, 190, 200, 200]);
        assert!(!detector.blink_detected());
        assert!(steps
            .iter()
            .all(|s| matches!(s, ChallengeProgress::Pending { .. })));
    }

    #[test]
    fn test_eyes_still_closed_keeps_waiting() {
        let mut detector = BlinkDetector::new(&LivenessConfig::default());
        let steps = feed(&mut detector, &[200, 200, 200, 150, 150]);
        // baseline still 200 for the fifth sample, drop 25%
        assert!(matches!(
            steps[4],
            ChallengeProgress::Pending { score: GESTURE_SCORE, message: "Open your eyes" }
        ));
    }

    #[test]
    fn test_progress_score_grows_and_caps() {
        let mut detector = BlinkDetector::new(&LivenessConfig::default());
        let steps = feed(&mut detector, &[200; 14]);
        let scores: Vec<u8> = steps
            .iter()
            .map(|s| match s {
                ChallengeProgress::Pending { score, .. } => *score,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(scores[0], 42);
        assert!(scores.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*scores.last().unwrap(), 60);
    }

    #[test]
    fn test_black_frames_do_not_divide_by_zero() {
        let mut detector = BlinkDetector::new(&LivenessConfig::default());
        let steps = feed(&mut detector, &[0, 0, 0, 0]);
        assert!(steps
            .iter()
            .all(|s| matches!(s, ChallengeProgress::Pending { .. })));
    }

    #[test]
    fn test_reset_clears_detection() {
        let mut detector = BlinkDetector::new(&LivenessConfig::default());
        feed(&mut detector, &[200, 200, 200, 150]);
        assert!(detector.blink_detected());
        detector.reset();
        assert!(!detector.blink_detected());
        assert!(matches!(
            feed(&mut detector, &[200])[0],
            ChallengeProgress::Pending { score: 42, .. }
        ));
    }

    #[test]
    fn test_history_is_bounded() {
        let config = LivenessConfig::default();
        let mut detector = BlinkDetector::new(&config);
        feed(&mut detector, &[200; 50]);
        assert_eq!(detector.history.len(), config.history_capacity);
    }
}
