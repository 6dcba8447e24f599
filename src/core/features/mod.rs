//! # Features Module
//!
//! Extracts local features from an image: corner keypoints located across a
//! scale pyramid, each paired with a fixed-length gradient-histogram
//! descriptor.
//!
//! ## How It Works
//! 1. Build a grayscale scale pyramid (moderate scale invariance)
//! 2. Detect segment-test corners at every level
//! 3. Suppress non-maxima and keep the strongest keypoints
//! 4. Assign each keypoint an orientation from its intensity centroid
//!    (moderate rotation invariance)
//! 5. Sample an oriented patch and accumulate gradient-orientation
//!    histograms into a 128-dimensional descriptor
//!
//! Extraction is side-effect-free and never fails: an image with no stable
//! structure simply yields an empty [`FeatureSet`].

mod descriptor;
mod detector;
mod pyramid;

use crate::error::ConfigError;
use image::GrayImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

pub use descriptor::PATCH_RADIUS;

/// Descriptor dimensionality, constant for every image in a run.
///
/// 4x4 spatial cells times 8 orientation bins.
pub const DESCRIPTOR_DIM: usize = 128;

/// A distinctive, repeatably-locatable point in an image.
///
/// Coordinates are in original-image space regardless of the pyramid level
/// the point was detected at.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Keypoint {
    /// X coordinate (column) in the original image
    pub x: f32,
    /// Y coordinate (row) in the original image
    pub y: f32,
    /// Scale of the pyramid level the point was detected at (>= 1.0)
    pub scale: f32,
    /// Orientation in radians, from the patch intensity centroid
    pub angle: f32,
    /// Detector response; higher is more stable
    pub response: f32,
    /// Pyramid level index
    pub octave: u8,
}

/// A fixed-length numeric vector summarizing local appearance around a
/// keypoint.
///
/// The dimension is a compile-time constant, so descriptors from different
/// images are comparable by construction.
#[derive(Debug, Clone)]
pub struct Descriptor([f32; DESCRIPTOR_DIM]);

impl Descriptor {
    pub fn new(values: [f32; DESCRIPTOR_DIM]) -> Self {
        Self(values)
    }

    /// Euclidean distance to another descriptor
    pub fn distance(&self, other: &Descriptor) -> f32 {
        self.distance_squared(other).sqrt()
    }

    /// Squared Euclidean distance; cheaper when only ranking matters
    pub fn distance_squared(&self, other: &Descriptor) -> f32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| {
                let d = a - b;
                d * d
            })
            .sum()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

/// The ordered sequence of (keypoint, descriptor) pairs for one image.
///
/// Produced once per image per run and never mutated afterwards. May be
/// empty.
#[derive(Debug, Clone, Default)]
pub struct FeatureSet {
    keypoints: Vec<Keypoint>,
    descriptors: Vec<Descriptor>,
}

impl FeatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            keypoints: Vec::with_capacity(capacity),
            descriptors: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, keypoint: Keypoint, descriptor: Descriptor) {
        self.keypoints.push(keypoint);
        self.descriptors.push(descriptor);
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }
}

/// Configuration for the feature extractor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Intensity threshold for the segment-test corner detector
    pub corner_threshold: u8,
    /// Maximum number of keypoints to keep across all pyramid levels
    pub max_features: usize,
    /// Number of pyramid levels
    pub pyramid_levels: u8,
    /// Downscale factor between consecutive levels (> 1.0)
    pub scale_factor: f32,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            corner_threshold: 20,
            max_features: 500,
            pyramid_levels: 4,
            scale_factor: 1.2,
        }
    }
}

impl ExtractorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pyramid_levels == 0 {
            return Err(ConfigError::NoPyramidLevels);
        }
        if !(self.scale_factor > 1.0) || !self.scale_factor.is_finite() {
            return Err(ConfigError::InvalidScaleFactor {
                value: self.scale_factor,
            });
        }
        if self.max_features == 0 {
            return Err(ConfigError::NoFeatureCapacity);
        }
        Ok(())
    }
}

/// Trait for feature extractors
///
/// Implement this to swap in a different detector (e.g. for testing).
pub trait FeatureExtractor: Send + Sync {
    /// Extract features from a grayscale image.
    ///
    /// Never fails: an image without extractable structure yields an empty
    /// set.
    fn extract(&self, image: &GrayImage) -> FeatureSet;
}

/// The default extractor: segment-test corners across a scale pyramid with
/// oriented gradient-histogram descriptors.
pub struct PyramidExtractor {
    config: ExtractorConfig,
}

impl PyramidExtractor {
    pub fn new(config: ExtractorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }
}

impl FeatureExtractor for PyramidExtractor {
    fn extract(&self, image: &GrayImage) -> FeatureSet {
        let levels = pyramid::build_pyramid(
            image,
            self.config.pyramid_levels,
            self.config.scale_factor,
        );

        // Detect and describe per level in parallel; each level is
        // independent.
        let per_level: Vec<Vec<(Keypoint, Descriptor)>> = levels
            .par_iter()
            .enumerate()
            .map(|(octave, level)| {
                let corners =
                    detector::detect_corners(&level.image, self.config.corner_threshold);
                let corners = detector::suppress_non_maxima(corners);

                corners
                    .into_iter()
                    .filter_map(|corner| {
                        let angle = detector::orientation(&level.image, corner.x, corner.y);
                        let descriptor = descriptor::describe(
                            &level.image,
                            corner.x as f32,
                            corner.y as f32,
                            angle,
                        )?;
                        let keypoint = Keypoint {
                            x: corner.x as f32 * level.scale,
                            y: corner.y as f32 * level.scale,
                            scale: level.scale,
                            angle,
                            response: corner.response,
                            octave: octave as u8,
                        };
                        Some((keypoint, descriptor))
                    })
                    .collect()
            })
            .collect();

        let mut pairs: Vec<(Keypoint, Descriptor)> =
            per_level.into_iter().flatten().collect();

        // Strongest first, with a full ordering so the retained set is
        // deterministic across runs.
        pairs.sort_by(|(a, _), (b, _)| {
            b.response
                .total_cmp(&a.response)
                .then_with(|| a.y.total_cmp(&b.y))
                .then_with(|| a.x.total_cmp(&b.x))
                .then_with(|| a.octave.cmp(&b.octave))
        });
        pairs.truncate(self.config.max_features);

        let mut features = FeatureSet::with_capacity(pairs.len());
        for (keypoint, descriptor) in pairs {
            features.push(keypoint, descriptor);
        }
        features
    }
}
