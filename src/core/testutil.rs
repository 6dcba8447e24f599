//! Shared fixtures for unit tests.

use image::{GrayImage, Luma};

/// Deterministic test texture: random high-contrast discs over per-pixel
/// noise. The discs give the corner detector strong structure; the noise
/// keeps every neighborhood unique so descriptors are unambiguous.
pub(crate) fn blob_texture(seed: u64, width: u32, height: u32) -> GrayImage {
    let mut state = (seed << 1) | 1;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };

    let mut image = GrayImage::from_pixel(width, height, Luma([128u8]));

    for y in 0..height {
        for x in 0..width {
            let delta = (next() % 61) as i32 - 30;
            let value = (128 + delta).clamp(0, 255) as u8;
            image.put_pixel(x, y, Luma([value]));
        }
    }

    for _ in 0..200 {
        let cx = (next() % width as u64) as i32;
        let cy = (next() % height as u64) as i32;
        let radius = 2 + (next() % 4) as i32;
        let value = if next() % 2 == 0 { 10u8 } else { 245u8 };
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy > radius * radius {
                    continue;
                }
                let px = cx + dx;
                let py = cy + dy;
                if px >= 0 && py >= 0 && (px as u32) < width && (py as u32) < height {
                    image.put_pixel(px as u32, py as u32, Luma([value]));
                }
            }
        }
    }

    image
}
