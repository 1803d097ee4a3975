//! Skin-tone histogram face matching.
//!
//! Compares the colour distribution of skin pixels in the upper part of two
//! images. This is a coarse colour similarity, not a geometric or embedding
//! match: two different people with similar skin tone under similar lighting
//! can match. The result is advisory.

use image::DynamicImage;
use serde::Serialize;

use crate::config::MatchConfig;
use crate::error::FrameError;
use crate::frame::{sample_image, Frame};
use crate::skin::is_skin;

/// Number of buckets per channel.
pub const HISTOGRAM_BINS: usize = 16;

const BIN_WIDTH: usize = 256 / HISTOGRAM_BINS;

/// Channel weights for the combined correlation (R, G, B).
const CHANNEL_WEIGHTS: [f32; 3] = [0.40, 0.35, 0.25];

/// Normalised per-channel distribution of skin pixels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkinHistogram {
    pub r: [f32; HISTOGRAM_BINS],
    pub g: [f32; HISTOGRAM_BINS],
    pub b: [f32; HISTOGRAM_BINS],
    pub skin_pixel_count: usize,
}

impl SkinHistogram {
    /// Bucket every skin pixel of `frame`. With no skin pixels all bins are zero.
    pub fn from_frame(frame: &Frame) -> Self {
        let mut counts = [[0u32; HISTOGRAM_BINS]; 3];
        let mut skin = 0usize;

        for (_, _, r, g, b) in frame.pixels() {
            if !is_skin(r, g, b) {
                continue;
            }
            counts[0][usize::from(r) / BIN_WIDTH] += 1;
            counts[1][usize::from(g) / BIN_WIDTH] += 1;
            counts[2][usize::from(b) / BIN_WIDTH] += 1;
            skin += 1;
        }

        let normalise = |channel: &[u32; HISTOGRAM_BINS]| {
            let mut out = [0.0f32; HISTOGRAM_BINS];
            if skin > 0 {
                for (o, &c) in out.iter_mut().zip(channel) {
                    *o = c as f32 / skin as f32;
                }
            }
            out
        };

        Self {
            r: normalise(&counts[0]),
            g: normalise(&counts[1]),
            b: normalise(&counts[2]),
            skin_pixel_count: skin,
        }
    }

    /// Weighted per-channel Pearson correlation in `[0, 1]`. Negative
    /// channel correlations count as zero.
    pub fn correlate(&self, other: &SkinHistogram) -> f32 {
        let channels = [
            pearson(&self.r, &other.r),
            pearson(&self.g, &other.g),
            pearson(&self.b, &other.b),
        ];
        channels
            .iter()
            .zip(CHANNEL_WEIGHTS)
            .map(|(&c, w)| c.max(0.0) * w)
            .sum::<f32>()
            .clamp(0.0, 1.0)
    }
}

/// Pearson correlation of two equal-length series.
///
/// When either series has zero variance the correlation is undefined; it is
/// reported as `1.0` for identical series and `0.0` otherwise.
pub fn pearson(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let (a, b) = (&a[..n], &b[..n]);
    let mean_a = a.iter().sum::<f32>() / n as f32;
    let mean_b = b.iter().sum::<f32>() / n as f32;

    let mut cov = 0.0f32;
    let mut var_a = 0.0f32;
    let mut var_b = 0.0f32;
    for (&x, &y) in a.iter().zip(b) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    let denom = (var_a * var_b).sqrt();
    if denom <= f32::EPSILON {
        return if a == b { 1.0 } else { 0.0 };
    }
    (cov / denom).clamp(-1.0, 1.0)
}

/// Outcome of a face comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FaceMatchResult {
    pub matched: bool,
    /// Similarity percentage, 0-100.
    pub similarity: u8,
    pub message: String,
}

/// Compare a captured image against an enrolled reference with default tunables.
pub fn compare_faces(captured: &DynamicImage, reference: &DynamicImage) -> FaceMatchResult {
    compare_faces_with(captured, reference, &MatchConfig::default())
}

/// Compare a captured image against an enrolled reference.
pub fn compare_faces_with(
    captured: &DynamicImage,
    reference: &DynamicImage,
    config: &MatchConfig,
) -> FaceMatchResult {
    let captured = face_histogram(captured, config);
    let reference = face_histogram(reference, config);

    let (Some(captured), Some(reference)) = (captured, reference) else {
        return no_face();
    };
    compare_histograms(&captured, &reference, config)
}

/// Decode two encoded images and compare them.
pub fn compare_face_bytes(captured: &[u8], reference: &[u8]) -> Result<FaceMatchResult, FrameError> {
    compare_face_bytes_with(captured, reference, &MatchConfig::default())
}

pub fn compare_face_bytes_with(
    captured: &[u8],
    reference: &[u8],
    config: &MatchConfig,
) -> Result<FaceMatchResult, FrameError> {
    let captured = image::load_from_memory(captured)?;
    let reference = image::load_from_memory(reference)?;
    Ok(compare_faces_with(&captured, &reference, config))
}

/// Correlate two prepared histograms.
pub fn compare_histograms(
    captured: &SkinHistogram,
    reference: &SkinHistogram,
    config: &MatchConfig,
) -> FaceMatchResult {
    if captured.skin_pixel_count < config.min_skin_pixels
        || reference.skin_pixel_count < config.min_skin_pixels
    {
        tracing::debug!(
            captured = captured.skin_pixel_count,
            reference = reference.skin_pixel_count,
            min = config.min_skin_pixels,
            "too few skin pixels to compare"
        );
        return no_face();
    }

    let correlation = captured.correlate(reference);
    let similarity = (correlation * 100.0).round().clamp(0.0, 100.0) as u8;
    let matched = similarity >= config.match_threshold;

    tracing::info!(similarity, matched, threshold = config.match_threshold, "face compared");

    FaceMatchResult {
        matched,
        similarity,
        message: if matched {
            "Identity verified".to_string()
        } else {
            "Face does not match the enrolled reference".to_string()
        },
    }
}

/// Histogram of the face region: downscale, then keep the top rows.
///
/// `None` for a zero-dimension image.
fn face_histogram(image: &DynamicImage, config: &MatchConfig) -> Option<SkinHistogram> {
    match sample_image(image, config.max_dim, 0) {
        Ok(frame) => Some(SkinHistogram::from_frame(
            &frame.crop_top(config.face_region_fraction),
        )),
        Err(e) => {
            tracing::warn!(error = %e, "cannot sample image for face match");
            None
        }
    }
}

fn no_face() -> FaceMatchResult {
    FaceMatchResult {
        matched: false,
        similarity: 0,
        message: "Could not detect a face in one of the images".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_histogram_bins_and_normalisation() {
        // (200, 150, 120) -> bins 12, 9, 7
        let frame = testutil::solid(10, 10, (200, 150, 120));
        let hist = SkinHistogram::from_frame(&frame);
        assert_eq!(hist.skin_pixel_count, 100);
        assert_eq!(hist.r[12], 1.0);
        assert_eq!(hist.g[9], 1.0);
        assert_eq!(hist.b[7], 1.0);
        assert!((hist.r.iter().sum::<f32>() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_histogram_without_skin_is_zero() {
        let hist = SkinHistogram::from_frame(&testutil::solid(10, 10, (0, 0, 255)));
        assert_eq!(hist.skin_pixel_count, 0);
        assert!(hist.r.iter().chain(&hist.g).chain(&hist.b).all(|&v| v == 0.0));
    }

    #[test]
    fn test_pearson_basics() {
        assert!((pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]) - 1.0).abs() < 1e-6);
        assert!((pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]) + 1.0).abs() < 1e-6);
        assert_eq!(pearson(&[1.0, 1.0], &[1.0, 1.0]), 1.0);
        assert_eq!(pearson(&[1.0, 1.0], &[0.0, 2.0]), 0.0);
        assert_eq!(pearson(&[], &[]), 0.0);
    }

    #[test]
    fn test_self_match_is_100() {
        let img = testutil::skin_image(120, 120, 0);
        let result = compare_faces(&img, &img);
        assert!(result.matched);
        assert_eq!(result.similarity, 100);
        assert_eq!(result.message, "Identity verified");
    }

    #[test]
    fn test_similarity_is_symmetric() {
        let a = testutil::skin_image(120, 120, 0);
        let b = testutil::skin_image(160, 90, 35);
        assert_eq!(
            compare_faces(&a, &b).similarity,
            compare_faces(&b, &a).similarity
        );
    }

    #[test]
    fn test_different_tones_do_not_match() {
        let light = DynamicImage::ImageRgb8(RgbImage::from_pixel(100, 100, Rgb([230, 180, 150])));
        let dark = DynamicImage::ImageRgb8(RgbImage::from_pixel(100, 100, Rgb([110, 70, 45])));
        let result = compare_faces(&light, &dark);
        assert!(!result.matched);
        assert!(result.similarity < 55);
        assert_eq!(result.message, "Face does not match the enrolled reference");
    }

    #[test]
    fn test_solid_non_skin_images_fail() {
        let blue = DynamicImage::ImageRgb8(RgbImage::from_pixel(80, 80, Rgb([0, 0, 255])));
        let green = DynamicImage::ImageRgb8(RgbImage::from_pixel(80, 80, Rgb([0, 200, 0])));
        let result = compare_faces(&blue, &green);
        assert_eq!(
            result,
            FaceMatchResult {
                matched: false,
                similarity: 0,
                message: "Could not detect a face in one of the images".to_string(),
            }
        );
    }

    #[test]
    fn test_no_skin_fails_regardless_of_other_image() {
        let blue = DynamicImage::ImageRgb8(RgbImage::from_pixel(80, 80, Rgb([0, 0, 255])));
        let face = testutil::skin_image(120, 120, 0);
        for result in [compare_faces(&blue, &face), compare_faces(&face, &blue)] {
            assert!(!result.matched);
            assert_eq!(result.similarity, 0);
        }
    }

    #[test]
    fn test_too_few_skin_pixels_fail() {
        // 9x9 skin patch = 81 pixels, below the 100 minimum
        let mut img = RgbImage::from_pixel(60, 60, Rgb([0, 0, 255]));
        for y in 0..9 {
            for x in 0..9 {
                img.put_pixel(x, y, Rgb([200, 150, 120]));
            }
        }
        let img = DynamicImage::ImageRgb8(img);
        let result = compare_faces(&img, &img);
        assert!(!result.matched);
        assert_eq!(result.similarity, 0);
    }

    #[test]
    fn test_face_below_top_region_is_not_seen() {
        // Known limitation: the face region is the top 60% of the image, so a
        // face framed low in the picture is invisible to the matcher.
        let mut img = RgbImage::from_pixel(100, 100, Rgb([0, 0, 255]));
        for y in 65..100 {
            for x in 20..80 {
                img.put_pixel(x, y, Rgb([200, 150, 120]));
            }
        }
        let img = DynamicImage::ImageRgb8(img);
        let result = compare_faces(&img, &img);
        assert!(!result.matched);
        assert_eq!(result.similarity, 0);
    }

    #[test]
    fn test_custom_threshold() {
        let a = testutil::skin_image(120, 120, 0);
        let config = MatchConfig {
            match_threshold: 101,
            ..MatchConfig::default()
        };
        let result = compare_faces_with(&a, &a, &config);
        assert_eq!(result.similarity, 100);
        assert!(!result.matched);
    }

    #[test]
    fn test_compare_bytes_surfaces_decode_error() {
        let err = compare_face_bytes(b"nope", b"nope").unwrap_err();
        assert!(matches!(err, FrameError::Decode(_)));
    }

    #[test]
    fn test_compare_bytes_round_trip_png() {
        let img = testutil::skin_image(64, 64, 0);
        let mut png = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let result = compare_face_bytes(&png, &png).unwrap();
        assert_eq!(result.similarity, 100);
    }
}
