//! # Render Module
//!
//! Side-by-side visualization of a scored image pair: both images on one
//! canvas, keypoints circled, surviving correspondences drawn as lines
//! between them.
//!
//! Rendering is decoupled from the pipeline through the [`MatchSink`]
//! trait, so runs without visualization pay nothing for it.

use crate::core::features::FeatureSet;
use crate::core::matcher::GoodMatch;
use crate::error::RenderError;
use image::{imageops, DynamicImage, GrayImage, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_circle_mut, draw_line_segment_mut};
use std::fs;
use std::path::PathBuf;

/// Canvases taller than this are scaled down for easier review
pub const TARGET_HEIGHT: u32 = 600;

const KEYPOINT_RADIUS: i32 = 3;

const KEYPOINT_COLOR: Rgb<u8> = Rgb([80, 200, 120]);

/// Line colors, cycled per correspondence
const PALETTE: [Rgb<u8>; 6] = [
    Rgb([230, 80, 80]),
    Rgb([80, 140, 230]),
    Rgb([230, 190, 60]),
    Rgb([170, 90, 220]),
    Rgb([70, 200, 200]),
    Rgb([240, 140, 50]),
];

/// Everything needed to draw one comparison
#[derive(Debug, Clone, Copy)]
pub struct MatchView<'a> {
    /// Label for the comparison, e.g. `MATCH: query.png vs catalog.png`
    pub title: &'a str,
    pub image_a: &'a GrayImage,
    pub features_a: &'a FeatureSet,
    pub image_b: &'a GrayImage,
    pub features_b: &'a FeatureSet,
    /// Surviving correspondences; `query_idx` into `features_a`,
    /// `reference_idx` into `features_b`
    pub matches: &'a [GoodMatch],
}

/// Destination for rendered comparisons
pub trait MatchSink: Send + Sync {
    fn present(&self, view: &MatchView<'_>) -> Result<(), RenderError>;
}

/// Discards every view; used when visualization is disabled.
pub struct NullSink;

impl MatchSink for NullSink {
    fn present(&self, _view: &MatchView<'_>) -> Result<(), RenderError> {
        Ok(())
    }
}

/// Draw the comparison onto a fresh canvas.
pub fn render(view: &MatchView<'_>) -> RgbImage {
    let (width_a, height_a) = view.image_a.dimensions();
    let (width_b, height_b) = view.image_b.dimensions();

    let mut canvas = RgbImage::from_pixel(
        width_a + width_b,
        height_a.max(height_b),
        Rgb([0, 0, 0]),
    );

    let left = DynamicImage::ImageLuma8(view.image_a.clone()).to_rgb8();
    let right = DynamicImage::ImageLuma8(view.image_b.clone()).to_rgb8();
    imageops::replace(&mut canvas, &left, 0, 0);
    imageops::replace(&mut canvas, &right, width_a as i64, 0);

    for kp in view.features_a.keypoints() {
        draw_hollow_circle_mut(
            &mut canvas,
            (kp.x.round() as i32, kp.y.round() as i32),
            KEYPOINT_RADIUS,
            KEYPOINT_COLOR,
        );
    }
    for kp in view.features_b.keypoints() {
        draw_hollow_circle_mut(
            &mut canvas,
            (kp.x.round() as i32 + width_a as i32, kp.y.round() as i32),
            KEYPOINT_RADIUS,
            KEYPOINT_COLOR,
        );
    }

    for (i, m) in view.matches.iter().enumerate() {
        let a = view.features_a.keypoints()[m.query_idx];
        let b = view.features_b.keypoints()[m.reference_idx];
        draw_line_segment_mut(
            &mut canvas,
            (a.x, a.y),
            (b.x + width_a as f32, b.y),
            PALETTE[i % PALETTE.len()],
        );
    }

    if canvas.height() > TARGET_HEIGHT {
        let scaled_width = (canvas.width() as f32 * TARGET_HEIGHT as f32
            / canvas.height() as f32) as u32;
        canvas = imageops::resize(
            &canvas,
            scaled_width.max(1),
            TARGET_HEIGHT,
            imageops::FilterType::Triangle,
        );
    }

    canvas
}

/// Writes each comparison as a PNG named after its title.
pub struct PngSink {
    out_dir: PathBuf,
}

impl PngSink {
    /// Create the sink, making the output directory if needed.
    pub fn new(out_dir: PathBuf) -> Result<Self, RenderError> {
        fs::create_dir_all(&out_dir).map_err(|source| RenderError::CreateDir {
            path: out_dir.clone(),
            source,
        })?;
        Ok(Self { out_dir })
    }

    fn file_name(title: &str) -> String {
        let stem: String = title
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        format!("{stem}.png")
    }
}

impl MatchSink for PngSink {
    fn present(&self, view: &MatchView<'_>) -> Result<(), RenderError> {
        let canvas = render(view);
        let path = self.out_dir.join(Self::file_name(view.title));
        canvas.save(&path).map_err(|e| RenderError::Write {
            path,
            reason: e.to_string(),
        })
    }
}
