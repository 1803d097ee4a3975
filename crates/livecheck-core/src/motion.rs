//! Passive liveness via inter-frame pixel difference.
//!
//! A printed photo or a frozen screen held in front of the camera produces
//! near-zero difference between consecutive frames (sensor noise only).
//! Heavy camera shake or lighting flicker produces very large differences.
//! A live person sits in between: small, involuntary movement that shows up
//! consistently across most frame pairs.
//!
//! # Threat Coverage
//!
//! - **Blocks:** printed photographs, paused video on a screen.
//! - **Does not block:** video replay, which moves like a real subject. The
//!   active challenge that follows is what raises the bar there.

use crate::config::LivenessConfig;
use crate::frame::Frame;

/// Mean over all pixels of the average absolute per-channel delta between
/// two frames, in `[0, 255]`.
///
/// Frames are expected to be the same size. If they are not, only the
/// overlapping prefix of the pixel buffers is compared; an empty overlap
/// yields `0.0`.
pub fn frame_difference(a: &Frame, b: &Frame) -> f32 {
    let len = a.data().len().min(b.data().len());
    let pixels = len / 3;
    if pixels == 0 {
        return 0.0;
    }

    let total: u64 = a.data()[..pixels * 3]
        .iter()
        .zip(&b.data()[..pixels * 3])
        .map(|(&x, &y)| u64::from(x.abs_diff(y)))
        .sum();

    // per-pixel channel mean, then mean over pixels
    total as f32 / 3.0 / pixels as f32
}

/// Outcome of analysing the frame buffer, first matching rule wins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionVerdict {
    /// Fewer frames than `min_frames`.
    Waiting,
    /// Mean motion below the natural band: likely a static photo.
    Static,
    /// Mean motion at or above the band: shake or flicker.
    Unstable,
    /// Enough frame pairs sit inside the natural band.
    Natural,
    /// Some natural motion, not yet consistent enough.
    Inconclusive,
}

/// Motion statistics over a sequence of frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionAnalysis {
    pub verdict: MotionVerdict,
    /// Mean [`frame_difference`] across adjacent pairs.
    pub avg_motion: f32,
    /// Fraction of adjacent pairs whose difference lies in `[motion_min, motion_max)`.
    pub natural_ratio: f32,
    /// Number of adjacent pairs analysed.
    pub pairs_analysed: usize,
}

impl MotionAnalysis {
    /// Analyse `frames` in capture order.
    pub fn over<'a, I>(frames: I, config: &LivenessConfig) -> Self
    where
        I: IntoIterator<Item = &'a Frame>,
    {
        let frames: Vec<&Frame> = frames.into_iter().collect();

        if frames.len() < config.min_frames {
            return Self {
                verdict: MotionVerdict::Waiting,
                avg_motion: 0.0,
                natural_ratio: 0.0,
                pairs_analysed: 0,
            };
        }

        let mut total = 0.0f32;
        let mut natural = 0usize;
        let mut pairs = 0usize;

        for pair in frames.windows(2) {
            let diff = frame_difference(pair[0], pair[1]);
            total += diff;
            if diff >= config.motion_min && diff < config.motion_max {
                natural += 1;
            }
            pairs += 1;
        }

        let (avg_motion, natural_ratio) = if pairs > 0 {
            (total / pairs as f32, natural as f32 / pairs as f32)
        } else {
            (0.0, 0.0)
        };

        let verdict = if avg_motion < config.motion_min {
            MotionVerdict::Static
        } else if avg_motion >= config.motion_max {
            MotionVerdict::Unstable
        } else if natural_ratio >= config.natural_ratio_threshold {
            MotionVerdict::Natural
        } else {
            MotionVerdict::Inconclusive
        };

        tracing::debug!(
            avg_motion,
            natural_ratio,
            pairs,
            verdict = ?verdict,
            "motion analysed"
        );

        Self {
            verdict,
            avg_motion,
            natural_ratio,
            pairs_analysed: pairs,
        }
    }

    /// Advisory progress score while motion is inconclusive.
    pub fn progress_score(&self) -> u8 {
        (self.natural_ratio * 50.0).round().clamp(0.0, 100.0) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[test]
    fn test_identical_frames_have_zero_difference() {
        let a = testutil::checkerboard(16, 16, 100, 120, false);
        assert_eq!(frame_difference(&a, &a.clone()), 0.0);
    }

    #[test]
    fn test_difference_is_mean_channel_delta() {
        let a = testutil::solid(8, 8, (10, 20, 30));
        let b = testutil::solid(8, 8, (40, 20, 0));
        // (30 + 0 + 30) / 3 = 20
        assert!((frame_difference(&a, &b) - 20.0).abs() < 1e-6);
        assert!((frame_difference(&b, &a) - 20.0).abs() < 1e-6);
    }

    #[test]
    fn test_mismatched_sizes_compare_overlap() {
        let a = testutil::solid(4, 4, (0, 0, 0));
        let b = testutil::solid(2, 2, (30, 30, 30));
        assert!((frame_difference(&a, &b) - 30.0).abs() < 1e-6);
    }

    #[test]
    fn test_too_few_frames_waits() {
        let config = LivenessConfig::default();
        let frames = testutil::alternating_checkerboards(3, 20);
        let analysis = MotionAnalysis::over(&frames, &config);
        assert_eq!(analysis.verdict, MotionVerdict::Waiting);
        assert_eq!(analysis.pairs_analysed, 0);
    }

    #[test]
    fn test_static_frames_are_static() {
        let config = LivenessConfig::default();
        let frame = testutil::checkerboard(16, 16, 100, 120, false);
        let frames = vec![frame; 10];
        let analysis = MotionAnalysis::over(&frames, &config);
        assert_eq!(analysis.verdict, MotionVerdict::Static);
        assert_eq!(analysis.avg_motion, 0.0);
        assert_eq!(analysis.pairs_analysed, 9);
    }

    #[test]
    fn test_checkerboard_alternation_is_natural() {
        let config = LivenessConfig::default();
        let frames = testutil::alternating_checkerboards(10, 20);
        let analysis = MotionAnalysis::over(&frames, &config);
        assert!((analysis.avg_motion - 20.0).abs() < 1e-4);
        assert!((analysis.natural_ratio - 1.0).abs() < 1e-6);
        assert_eq!(analysis.verdict, MotionVerdict::Natural);
    }

    #[test]
    fn test_excessive_motion_is_unstable() {
        let config = LivenessConfig::default();
        let frames = testutil::alternating_checkerboards(6, 120);
        let analysis = MotionAnalysis::over(&frames, &config);
        assert_eq!(analysis.verdict, MotionVerdict::Unstable);
    }

    #[test]
    fn test_band_upper_edge_is_exclusive() {
        let config = LivenessConfig::default();
        let frames = testutil::alternating_checkerboards(4, 45);
        let analysis = MotionAnalysis::over(&frames, &config);
        assert_eq!(analysis.natural_ratio, 0.0);
        assert_eq!(analysis.verdict, MotionVerdict::Unstable);
    }

    #[test]
    fn test_sparse_motion_is_inconclusive() {
        let config = LivenessConfig::default();
        // one moving pair out of four, rest static
        let still = testutil::checkerboard(16, 16, 100, 120, false);
        let moved = testutil::checkerboard(16, 16, 100, 120, true);
        let frames = vec![still.clone(), still.clone(), still.clone(), still, moved];
        let analysis = MotionAnalysis::over(&frames, &config);
        // avg 20 / 4 = 5, ratio 0.25
        assert!((analysis.avg_motion - 5.0).abs() < 1e-4);
        assert_eq!(analysis.verdict, MotionVerdict::Inconclusive);
        assert_eq!(analysis.progress_score(), 13);
    }
}
