//! Oriented gradient-histogram descriptors.
//!
//! A 16x16 sample lattice around the keypoint, rotated to its orientation,
//! is divided into 4x4 cells; each cell accumulates an 8-bin histogram of
//! gradient orientations weighted by gradient magnitude. The concatenated
//! histograms are normalized, clamped, and renormalized, which gives
//! moderate illumination invariance.

use super::{Descriptor, DESCRIPTOR_DIM};
use image::GrayImage;
use std::f32::consts::PI;

/// Margin a keypoint needs from the image border for the rotated patch
/// (including the gradient stencil) to stay inside the image.
pub const PATCH_RADIUS: i32 = 13;

/// Cells per side of the spatial grid
const GRID: i32 = 4;
/// Samples per side of one cell
const CELL: i32 = 4;
/// Orientation bins per cell
const BINS: usize = 8;
/// Clamp applied after the first normalization
const CLAMP: f32 = 0.2;

/// Compute a descriptor for the keypoint at (x, y) with the given
/// orientation. Returns `None` when the patch would leave the image or the
/// patch has no gradient at all; such keypoints are dropped.
pub(crate) fn describe(image: &GrayImage, x: f32, y: f32, angle: f32) -> Option<Descriptor> {
    let (width, height) = image.dimensions();
    let xi = x.round() as i32;
    let yi = y.round() as i32;

    if xi < PATCH_RADIUS
        || yi < PATCH_RADIUS
        || xi + PATCH_RADIUS >= width as i32
        || yi + PATCH_RADIUS >= height as i32
    {
        return None;
    }

    let (sin_a, cos_a) = angle.sin_cos();
    let mut hist = [0.0f32; DESCRIPTOR_DIM];

    let side = GRID * CELL;
    let half = (side as f32 - 1.0) / 2.0;

    for sy in 0..side {
        for sx in 0..side {
            // Sample offset in the keypoint frame, rotated into image space
            let u = sx as f32 - half;
            let v = sy as f32 - half;
            let rx = u * cos_a - v * sin_a;
            let ry = u * sin_a + v * cos_a;
            let px = xi + rx.round() as i32;
            let py = yi + ry.round() as i32;

            // Central differences, then rotate the gradient back into the
            // keypoint frame so the descriptor is orientation-normalized
            let dx = pixel(image, px + 1, py) - pixel(image, px - 1, py);
            let dy = pixel(image, px, py + 1) - pixel(image, px, py - 1);
            let gx = dx * cos_a + dy * sin_a;
            let gy = -dx * sin_a + dy * cos_a;

            let magnitude = (gx * gx + gy * gy).sqrt();
            if magnitude == 0.0 {
                continue;
            }

            let theta = gy.atan2(gx);
            let mut bin = ((theta + PI) / (2.0 * PI) * BINS as f32) as usize;
            if bin >= BINS {
                bin = BINS - 1;
            }

            let cell_x = (sx / CELL) as usize;
            let cell_y = (sy / CELL) as usize;
            hist[(cell_y * GRID as usize + cell_x) * BINS + bin] += magnitude;
        }
    }

    if !normalize(&mut hist) {
        return None;
    }
    for value in hist.iter_mut() {
        *value = value.min(CLAMP);
    }
    normalize(&mut hist);

    Some(Descriptor::new(hist))
}

fn normalize(values: &mut [f32; DESCRIPTOR_DIM]) -> bool {
    let norm: f32 = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return false;
    }
    for value in values.iter_mut() {
        *value /= norm;
    }
    true
}

fn pixel(image: &GrayImage, x: i32, y: i32) -> f32 {
    image.get_pixel(x as u32, y as u32)[0] as f32
}
