//! Pixel work for the preview: decode, letterbox, rotate, and the geometry
//! of the guide grid and angle gauge.

use std::path::Path;

use image::imageops::FilterType;
use image::{Rgb, RgbImage};

use crate::error::{LabelerError, Result};

/// Gray used both for letterbox padding and for pixels rotated in from
/// outside the canvas.
pub const FILL_GRAY: u8 = 125;

const FILL: Rgb<u8> = Rgb([FILL_GRAY; 3]);

/// Sample coordinates are snapped to 1/32 pixel before interpolating, which
/// keeps right-angle rotations exact.
const SUBPIXEL_STEPS: f32 = 32.0;

pub fn decode(path: &Path) -> Result<RgbImage> {
    let img = image::open(path).map_err(|source| LabelerError::ImageDecode {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(img.to_rgb8())
}

/// Fit `img` into a `size`×`size` square, keeping its aspect ratio and
/// centering it on a gray background.
pub fn letterbox(img: &RgbImage, size: u32) -> RgbImage {
    let mut canvas = RgbImage::from_pixel(size, size, FILL);
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 || size == 0 {
        return canvas;
    }

    let scale = size as f64 / w.max(h) as f64;
    let new_w = ((w as f64 * scale) as u32).clamp(1, size);
    let new_h = ((h as f64 * scale) as u32).clamp(1, size);
    let resized = image::imageops::resize(img, new_w, new_h, FilterType::Triangle);

    let x = (size - new_w) / 2;
    let y = (size - new_h) / 2;
    image::imageops::replace(&mut canvas, &resized, x as i64, y as i64);
    canvas
}

/// Rotate `canvas` about its center by `angle` degrees (positive turns the
/// picture counter-clockwise on screen). Output keeps the input size.
pub fn rotate(canvas: &RgbImage, angle: f32) -> RgbImage {
    if angle == 0.0 {
        return canvas.clone();
    }
    let (w, h) = canvas.dimensions();
    let cx = (w / 2) as f32;
    let cy = (h / 2) as f32;
    let (sin, cos) = angle.to_radians().sin_cos();

    RgbImage::from_fn(w, h, |x, y| {
        let dx = x as f32 - cx;
        let dy = y as f32 - cy;
        let sx = snap(cos * dx - sin * dy + cx);
        let sy = snap(sin * dx + cos * dy + cy);
        sample_bilinear(canvas, sx, sy)
    })
}

fn snap(v: f32) -> f32 {
    (v * SUBPIXEL_STEPS).round() / SUBPIXEL_STEPS
}

fn pixel_or_fill(img: &RgbImage, x: i64, y: i64) -> Rgb<u8> {
    if x < 0 || y < 0 || x >= img.width() as i64 || y >= img.height() as i64 {
        FILL
    } else {
        *img.get_pixel(x as u32, y as u32)
    }
}

fn sample_bilinear(img: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let taps = [
        (x0, y0, (1.0 - fx) * (1.0 - fy)),
        (x0 + 1, y0, fx * (1.0 - fy)),
        (x0, y0 + 1, (1.0 - fx) * fy),
        (x0 + 1, y0 + 1, fx * fy),
    ];
    let mut acc = [0.0f32; 3];
    for (px, py, weight) in taps {
        if weight == 0.0 {
            continue;
        }
        let p = pixel_or_fill(img, px, py);
        for (sum, channel) in acc.iter_mut().zip(p.0) {
            *sum += weight * channel as f32;
        }
    }
    // truncate like a plain float -> u8 cast
    Rgb(acc.map(|v| v.clamp(0.0, 255.0) as u8))
}

// ── Overlay geometry ────────────────────────────────────────────────────────

/// Evenly spaced guide lines, used for both axes of the square canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GuideLines {
    pub interval: u32,
    pub extent: u32,
}

impl GuideLines {
    pub fn positions(&self) -> impl Iterator<Item = u32> {
        (0..self.extent).step_by(self.interval.max(1) as usize)
    }
}

/// Where `angle` sits on the gauge, from 0.0 (at `-max_angle`) to 1.0.
pub fn gauge_fraction(angle: f32, max_angle: f32) -> f64 {
    let (angle, max_angle) = (angle as f64, max_angle as f64);
    ((angle + max_angle) / (2.0 * max_angle)).clamp(0.0, 1.0)
}

/// Whole-pixel offset of the gauge cursor on a gauge `width` pixels wide.
pub fn gauge_offset(fraction: f64, width: f32) -> f32 {
    if width <= 0.0 {
        return 0.0;
    }
    (fraction.clamp(0.0, 1.0) * width as f64).trunc() as f32
}

/// Angle selected by a pointer at `x` on a gauge `width` pixels wide.
pub fn gauge_angle(x: f32, width: f32, max_angle: f32) -> f32 {
    if width <= 0.0 {
        return 0.0;
    }
    let x = x.clamp(0.0, width);
    (x / width * 2.0 - 1.0) * max_angle
}
