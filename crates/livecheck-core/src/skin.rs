//! Skin-tone pixel classifier.
//!
//! Three overlapping linear rules over RGB values cover light, dark and
//! medium skin under typical camera white balance. The classifier is crude:
//! orange and brown surfaces (wood, cardboard) classify as skin. It gates a
//! UX flow and is never a security boundary on its own.

use crate::frame::Frame;

/// Whether `(r, g, b)` is a plausible human-skin pixel.
pub fn is_skin(r: u8, g: u8, b: u8) -> bool {
    let (r, g, b) = (i32::from(r), i32::from(g), i32::from(b));
    is_bright_skin(r, g, b) || is_dark_skin(r, g, b) || is_medium_skin(r, g, b)
}

fn is_bright_skin(r: i32, g: i32, b: i32) -> bool {
    let spread = r.max(g).max(b) - r.min(g).min(b);
    r > 95 && g > 40 && b > 20 && spread > 15 && (r - g).abs() > 15 && r > g && r > b
}

fn is_dark_skin(r: i32, g: i32, b: i32) -> bool {
    r > 60 && g > 40 && b > 30 && r > g && g > b && (r - b) > 10 && (r - g) < 100
}

fn is_medium_skin(r: i32, g: i32, b: i32) -> bool {
    r > 80 && g > 50 && b > 35 && r > g && g >= b && (r - g).abs() < 80
}

/// Mean x coordinate of all skin pixels, in pixel units of `frame`.
///
/// Returns `None` when the frame contains no skin pixel.
pub fn skin_centroid_x(frame: &Frame) -> Option<f32> {
    let mut sum = 0u64;
    let mut count = 0u64;
    for (x, _, r, g, b) in frame.pixels() {
        if is_skin(r, g, b) {
            sum += u64::from(x);
            count += 1;
        }
    }
    if count == 0 {
        return None;
    }
    Some(sum as f32 / count as f32)
}
