//! # Matcher Module
//!
//! Scores how strongly two images share visual content.
//!
//! For every query descriptor the matcher finds its two nearest reference
//! descriptors, applies the distance-ratio test to discard ambiguous
//! correspondences, and reports the surviving count as the pair's score.
//! The score is asymmetric in principle (query vs. reference roles differ)
//! but near-symmetric in practice.

use crate::core::features::FeatureSet;
use crate::core::index::{build_index, IndexConfig};
use crate::error::ConfigError;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Default distance-ratio threshold
pub const DEFAULT_RATIO: f32 = 0.7;

/// A candidate correspondence before the ratio test
#[derive(Debug, Clone, Copy)]
pub struct Correspondence {
    /// Descriptor index in the query set
    pub query_idx: usize,
    /// Index of the nearest reference descriptor
    pub reference_idx: usize,
    /// Distance to the nearest reference descriptor
    pub distance: f32,
    /// Distance to the second-nearest, absent when the reference set has
    /// only one descriptor
    pub second_distance: Option<f32>,
}

/// A correspondence that survived the ratio test
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GoodMatch {
    pub query_idx: usize,
    pub reference_idx: usize,
    pub distance: f32,
}

/// The outcome of comparing one query image against one reference image
#[derive(Debug, Clone, Default)]
pub struct MatchResult {
    /// Number of unambiguous correspondences; the similarity score
    pub score: u32,
    pub good_matches: Vec<GoodMatch>,
}

/// Configuration for pairwise matching
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Ratio-test threshold in (0, 1); lower is stricter
    pub ratio: f32,
    pub index: IndexConfig,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            ratio: DEFAULT_RATIO,
            index: IndexConfig::default(),
        }
    }
}

impl MatcherConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.ratio > 0.0 && self.ratio < 1.0) || !self.ratio.is_finite() {
            return Err(ConfigError::InvalidRatio { value: self.ratio });
        }
        self.index.validate()
    }
}

/// Find the nearest-two correspondence for every query descriptor.
///
/// Returns an empty list when either side has no descriptors. Queries run
/// in parallel against a shared index; output order follows query order.
pub fn find_correspondences(
    query: &FeatureSet,
    reference: &FeatureSet,
    index_config: &IndexConfig,
) -> Vec<Correspondence> {
    if query.is_empty() || reference.is_empty() {
        return Vec::new();
    }

    let index = build_index(reference.descriptors(), index_config);

    query
        .descriptors()
        .par_iter()
        .enumerate()
        .filter_map(|(query_idx, descriptor)| {
            index.nearest_two(descriptor).map(|n| Correspondence {
                query_idx,
                reference_idx: n.index,
                distance: n.distance,
                second_distance: n.second_distance,
            })
        })
        .collect()
}

/// Keep a correspondence only when its nearest distance is decisively
/// smaller than its second-nearest. Correspondences without a second
/// neighbor are dropped as unverifiable.
pub fn ratio_filter(correspondences: &[Correspondence], ratio: f32) -> Vec<GoodMatch> {
    correspondences
        .iter()
        .filter_map(|c| {
            let second = c.second_distance?;
            (c.distance < ratio * second).then_some(GoodMatch {
                query_idx: c.query_idx,
                reference_idx: c.reference_idx,
                distance: c.distance,
            })
        })
        .collect()
}

/// Compares image pairs under a fixed, validated configuration.
pub struct PairComparator {
    config: MatcherConfig,
}

impl PairComparator {
    pub fn new(config: MatcherConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Score the query feature set against the reference feature set.
    ///
    /// Either side being empty short-circuits to a zero score.
    pub fn compare(&self, query: &FeatureSet, reference: &FeatureSet) -> MatchResult {
        if query.is_empty() || reference.is_empty() {
            return MatchResult::default();
        }

        let correspondences = find_correspondences(query, reference, &self.config.index);
        let good_matches = ratio_filter(&correspondences, self.config.ratio);

        MatchResult {
            score: good_matches.len() as u32,
            good_matches,
        }
    }
}
