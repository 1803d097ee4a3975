//! Synthetic frames for unit tests.

use image::{DynamicImage, Rgb, RgbImage};

use crate::challenge::eye_region;
use crate::frame::Frame;

const SKIN: (u8, u8, u8) = (200, 150, 120);

fn frame_from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> (u8, u8, u8)) -> Frame {
    let mut data = Vec::with_capacity(width as usize * height as usize * 3);
    for y in 0..height {
        for x in 0..width {
            let (r, g, b) = f(x, y);
            data.extend_from_slice(&[r, g, b]);
        }
    }
    Frame::new(width, height, data, 0).unwrap()
}

fn grey(v: u8) -> (u8, u8, u8) {
    (v, v, v)
}

fn checker(x: u32, y: u32, a: u8, b: u8, phase: bool) -> u8 {
    if ((x + y) % 2 == 0) != phase {
        a
    } else {
        b
    }
}

pub fn solid(width: u32, height: u32, rgb: (u8, u8, u8)) -> Frame {
    frame_from_fn(width, height, |_, _| rgb)
}

/// Grey checkerboard; flipping `phase` swaps `a` and `b` on every pixel.
pub fn checkerboard(width: u32, height: u32, a: u8, b: u8, phase: bool) -> Frame {
    frame_from_fn(width, height, |x, y| grey(checker(x, y, a, b, phase)))
}

/// `count` 32x32 checkerboards alternating phase, with a mean channel
/// delta of exactly `delta` between neighbours.
pub fn alternating_checkerboards(count: usize, delta: u8) -> Vec<Frame> {
    (0..count)
        .map(|i| checkerboard(32, 32, 100, 100 + delta.min(155), i % 2 == 1))
        .collect()
}

/// Checkerboard (100/140) outside the eye band, solid grey `eye_level` inside.
pub fn eye_frame(width: u32, height: u32, phase: bool, eye_level: u8) -> Frame {
    let region = eye_region(width, height);
    frame_from_fn(width, height, |x, y| {
        if region.contains(x, y) {
            grey(eye_level)
        } else {
            grey(checker(x, y, 100, 140, phase))
        }
    })
}

/// Full-height skin column `[x_start, x_start + blob_width)` on a dark background.
pub fn skin_blob(width: u32, height: u32, x_start: u32, blob_width: u32) -> Frame {
    frame_from_fn(width, height, |x, _| {
        if x >= x_start && x < x_start + blob_width {
            SKIN
        } else {
            grey(20)
        }
    })
}

/// Skin column over a moving grey checkerboard (60/100).
pub fn head_frame(width: u32, height: u32, x_start: u32, blob_width: u32, phase: bool) -> Frame {
    frame_from_fn(width, height, |x, y| {
        if x >= x_start && x < x_start + blob_width {
            SKIN
        } else {
            grey(checker(x, y, 60, 100, phase))
        }
    })
}

/// Image made entirely of varied skin tones; `shift` changes the texture.
pub fn skin_image(width: u32, height: u32, shift: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            170 + ((x + shift) % 40) as u8,
            110 + ((y + shift) % 30) as u8,
            80 + ((x + y) % 20) as u8,
        ])
    }))
}
