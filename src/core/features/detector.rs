//! Segment-test corner detection, non-maximum suppression, and orientation
//! assignment.

use image::GrayImage;
use rayon::prelude::*;
use std::collections::HashSet;

/// Bresenham circle of radius 3 around the candidate pixel
const CIRCLE: [(i32, i32); 16] = [
    (0, -3),
    (1, -3),
    (2, -2),
    (3, -1),
    (3, 0),
    (3, 1),
    (2, 2),
    (1, 3),
    (0, 3),
    (-1, 3),
    (-2, 2),
    (-3, 1),
    (-3, 0),
    (-3, -1),
    (-2, -2),
    (-1, -3),
];

/// Contiguous arc length required for a corner
const ARC_LENGTH: usize = 9;

/// Pixels this close to the edge cannot host the test circle
const BORDER: u32 = 3;

/// Cell size for grid-based non-maximum suppression
const NMS_CELL: f32 = 5.0;

/// Radius of the intensity-centroid patch used for orientation
const ORIENTATION_RADIUS: i32 = 7;

#[derive(Debug, Clone, Copy)]
pub(crate) struct Corner {
    pub x: u32,
    pub y: u32,
    pub response: f32,
}

/// Detect segment-test corners: a pixel is a corner when at least
/// [`ARC_LENGTH`] contiguous circle pixels are all brighter or all darker
/// than the center by the threshold.
pub(crate) fn detect_corners(image: &GrayImage, threshold: u8) -> Vec<Corner> {
    let (width, height) = image.dimensions();
    if width <= 2 * BORDER || height <= 2 * BORDER {
        return Vec::new();
    }

    (BORDER..height - BORDER)
        .into_par_iter()
        .flat_map_iter(|y| {
            let mut row = Vec::new();
            for x in BORDER..width - BORDER {
                let center = image.get_pixel(x, y)[0];
                if !cardinal_pre_check(image, x, y, center, threshold) {
                    continue;
                }
                if has_contiguous_arc(image, x, y, center, threshold) {
                    row.push(Corner {
                        x,
                        y,
                        response: local_contrast(image, x, y),
                    });
                }
            }
            row.into_iter()
        })
        .collect()
}

/// Cheap rejection before the full arc test. A contiguous arc of 9 covers
/// at least 2 consecutive cardinal pixels, so fewer than 2 qualifying
/// cardinals rules a corner out.
fn cardinal_pre_check(image: &GrayImage, x: u32, y: u32, center: u8, threshold: u8) -> bool {
    let bright = center.saturating_add(threshold);
    let dark = center.saturating_sub(threshold);

    let pixels = [
        image.get_pixel(x, y - 3)[0],
        image.get_pixel(x + 3, y)[0],
        image.get_pixel(x, y + 3)[0],
        image.get_pixel(x - 3, y)[0],
    ];

    let bright_count = pixels.iter().filter(|&&p| p > bright).count();
    let dark_count = pixels.iter().filter(|&&p| p < dark).count();
    bright_count >= 2 || dark_count >= 2
}

fn has_contiguous_arc(image: &GrayImage, x: u32, y: u32, center: u8, threshold: u8) -> bool {
    let bright = center.saturating_add(threshold);
    let dark = center.saturating_sub(threshold);

    let mut max_bright = 0usize;
    let mut max_dark = 0usize;
    let mut run_bright = 0usize;
    let mut run_dark = 0usize;

    // Walk the circle twice to handle wraparound
    for i in 0..CIRCLE.len() * 2 {
        let (dx, dy) = CIRCLE[i % CIRCLE.len()];
        let px = (x as i32 + dx) as u32;
        let py = (y as i32 + dy) as u32;
        let pixel = image.get_pixel(px, py)[0];

        if pixel > bright {
            run_bright += 1;
            run_dark = 0;
            max_bright = max_bright.max(run_bright);
        } else if pixel < dark {
            run_dark += 1;
            run_bright = 0;
            max_dark = max_dark.max(run_dark);
        } else {
            run_bright = 0;
            run_dark = 0;
        }
    }

    max_bright >= ARC_LENGTH || max_dark >= ARC_LENGTH
}

/// Corner strength: intensity standard deviation over the 5x5 neighborhood.
fn local_contrast(image: &GrayImage, x: u32, y: u32) -> f32 {
    let mut sum = 0.0f32;
    let mut sum_sq = 0.0f32;
    let mut count = 0u32;

    for dy in -2i32..=2 {
        for dx in -2i32..=2 {
            let px = x as i32 + dx;
            let py = y as i32 + dy;
            if px >= 0 && py >= 0 && (px as u32) < image.width() && (py as u32) < image.height() {
                let value = image.get_pixel(px as u32, py as u32)[0] as f32;
                sum += value;
                sum_sq += value * value;
                count += 1;
            }
        }
    }

    let mean = sum / count as f32;
    let variance = (sum_sq / count as f32) - mean * mean;
    variance.max(0.0).sqrt()
}

/// Grid-based non-maximum suppression with a deterministic ordering.
///
/// Corners are visited strongest-first; a corner survives only if no
/// stronger corner already occupies a neighboring grid cell.
pub(crate) fn suppress_non_maxima(mut corners: Vec<Corner>) -> Vec<Corner> {
    if corners.is_empty() {
        return corners;
    }

    corners.sort_by(|a, b| {
        b.response
            .total_cmp(&a.response)
            .then_with(|| a.y.cmp(&b.y))
            .then_with(|| a.x.cmp(&b.x))
    });

    let mut occupied = HashSet::new();
    let mut selected = Vec::new();

    for corner in corners {
        let gx = (corner.x as f32 / NMS_CELL) as i32;
        let gy = (corner.y as f32 / NMS_CELL) as i32;

        let mut is_maximum = true;
        'scan: for dy in -1i32..=1 {
            for dx in -1i32..=1 {
                if occupied.contains(&(gx + dx, gy + dy)) {
                    is_maximum = false;
                    break 'scan;
                }
            }
        }

        if is_maximum {
            occupied.insert((gx, gy));
            selected.push(corner);
        }
    }

    selected
}

/// Keypoint orientation from the intensity centroid of the surrounding
/// patch. Out-of-image contributions are skipped.
pub(crate) fn orientation(image: &GrayImage, x: u32, y: u32) -> f32 {
    let mut m01 = 0.0f32;
    let mut m10 = 0.0f32;

    for dy in -ORIENTATION_RADIUS..=ORIENTATION_RADIUS {
        for dx in -ORIENTATION_RADIUS..=ORIENTATION_RADIUS {
            if dx * dx + dy * dy > ORIENTATION_RADIUS * ORIENTATION_RADIUS {
                continue;
            }
            let px = x as i32 + dx;
            let py = y as i32 + dy;
            if px >= 0 && py >= 0 && (px as u32) < image.width() && (py as u32) < image.height() {
                let value = image.get_pixel(px as u32, py as u32)[0] as f32;
                m10 += value * dx as f32;
                m01 += value * dy as f32;
            }
        }
    }

    m01.atan2(m10)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    /// A bright square on a dark background has corners at its corners.
    fn square_image() -> GrayImage {
        let mut image = GrayImage::from_pixel(64, 64, Luma([20u8]));
        for y in 20..44 {
            for x in 20..44 {
                image.put_pixel(x, y, Luma([220u8]));
            }
        }
        image
    }

    #[test]
    fn flat_image_has_no_corners() {
        let image = GrayImage::from_pixel(64, 64, Luma([128u8]));
        assert!(detect_corners(&image, 20).is_empty());
    }

    #[test]
    fn square_produces_corners_near_its_vertices() {
        let corners = detect_corners(&square_image(), 20);
        assert!(!corners.is_empty());

        // Every detection should be near one of the four square vertices
        let vertices = [(20.0, 20.0), (43.0, 20.0), (20.0, 43.0), (43.0, 43.0)];
        for corner in &corners {
            let near_vertex = vertices.iter().any(|&(vx, vy)| {
                let dx = corner.x as f32 - vx;
                let dy = corner.y as f32 - vy;
                dx * dx + dy * dy < 6.0 * 6.0
            });
            assert!(
                near_vertex,
                "corner at ({}, {}) far from any vertex",
                corner.x, corner.y
            );
        }
    }

    #[test]
    fn tiny_image_is_handled() {
        let image = GrayImage::from_pixel(4, 4, Luma([128u8]));
        assert!(detect_corners(&image, 20).is_empty());
    }

    #[test]
    fn suppression_keeps_the_strongest_of_a_cluster() {
        let corners = vec![
            Corner {
                x: 10,
                y: 10,
                response: 1.0,
            },
            Corner {
                x: 11,
                y: 10,
                response: 5.0,
            },
            Corner {
                x: 12,
                y: 11,
                response: 2.0,
            },
        ];

        let kept = suppress_non_maxima(corners);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].response, 5.0);
    }

    #[test]
    fn suppression_keeps_distant_corners() {
        let corners = vec![
            Corner {
                x: 5,
                y: 5,
                response: 1.0,
            },
            Corner {
                x: 50,
                y: 50,
                response: 1.0,
            },
        ];

        assert_eq!(suppress_non_maxima(corners).len(), 2);
    }

    #[test]
    fn orientation_points_toward_the_bright_side() {
        // Brighter to the right of the center: centroid angle near 0
        let mut image = GrayImage::from_pixel(32, 32, Luma([10u8]));
        for y in 0..32 {
            for x in 16..32 {
                image.put_pixel(x, y, Luma([200u8]));
            }
        }

        let angle = orientation(&image, 16, 16);
        assert!(angle.abs() < 0.3, "angle was {}", angle);
    }
}
