//! Frames and the pixel sampler.
//!
//! Every analyzer works on a [`Frame`]: a small, downscaled RGB grid. Camera
//! captures are never analysed at full resolution; [`sample_image`] shrinks
//! the longer side to a working maximum before anything else looks at it.

use std::path::Path;

use image::imageops::FilterType;
use image::DynamicImage;

use crate::error::FrameError;

/// An immutable RGB8 pixel grid plus its capture sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<u8>,
    sequence: u64,
}

impl Frame {
    /// Build a frame from packed RGB bytes (`width * height * 3`).
    pub fn new(width: u32, height: u32, data: Vec<u8>, sequence: u64) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::ZeroDimension { width, height });
        }
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(FrameError::BufferSize {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
            sequence,
        })
    }

    /// Convert a decoded image without resampling.
    pub fn from_image(image: &DynamicImage, sequence: u64) -> Result<Self, FrameError> {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        Self::new(width, height, rgb.into_raw(), sequence)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Packed RGB bytes, row-major.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn same_size(&self, other: &Frame) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// RGB triple at `(x, y)`. Caller guarantees the coordinate is in bounds.
    pub fn pixel(&self, x: u32, y: u32) -> (u8, u8, u8) {
        let i = (y as usize * self.width as usize + x as usize) * 3;
        (self.data[i], self.data[i + 1], self.data[i + 2])
    }

    /// Iterate `(x, y, r, g, b)` over every pixel.
    pub fn pixels(&self) -> impl Iterator<Item = (u32, u32, u8, u8, u8)> + '_ {
        let width = self.width as usize;
        self.data.chunks_exact(3).enumerate().map(move |(i, px)| {
            ((i % width) as u32, (i / width) as u32, px[0], px[1], px[2])
        })
    }

    /// Keep only the top `fraction` of rows (at least one row).
    pub fn crop_top(&self, fraction: f32) -> Frame {
        let rows = ((self.height as f32 * fraction.clamp(0.0, 1.0)).floor() as u32)
            .clamp(1, self.height);
        let len = rows as usize * self.width as usize * 3;
        Frame {
            width: self.width,
            height: rows,
            data: self.data[..len].to_vec(),
            sequence: self.sequence,
        }
    }
}

/// Downscale `image` so its longer side is at most `max_dim`, keeping aspect
/// ratio. Images already within the bound are converted as-is.
pub fn sample_image(image: &DynamicImage, max_dim: u32, sequence: u64) -> Result<Frame, FrameError> {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(FrameError::ZeroDimension { width, height });
    }

    let max_dim = max_dim.max(1);
    if width.max(height) <= max_dim {
        return Frame::from_image(image, sequence);
    }

    // `resize` fits inside the box and preserves aspect ratio. Triangle
    // widens its support when shrinking, so every source pixel contributes.
    let scaled = image.resize(max_dim, max_dim, FilterType::Triangle);
    tracing::trace!(
        from_w = width,
        from_h = height,
        to_w = scaled.width(),
        to_h = scaled.height(),
        "sampled frame"
    );
    Frame::from_image(&scaled, sequence)
}

/// Decode an encoded image (PNG, JPEG, ...) and sample it.
pub fn decode_frame(bytes: &[u8], max_dim: u32, sequence: u64) -> Result<Frame, FrameError> {
    let image = image::load_from_memory(bytes)?;
    sample_image(&image, max_dim, sequence)
}

/// Open an image file and sample it.
pub fn open_frame(path: &Path, max_dim: u32, sequence: u64) -> Result<Frame, FrameError> {
    let image = image::open(path).map_err(|source| FrameError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    sample_image(&image, max_dim, sequence)
}
