//! # Index Module
//!
//! Nearest-neighbor search over a reference descriptor set.
//!
//! Two backends are available behind the [`NeighborIndex`] trait:
//! - **Kd-forest** - randomized kd-trees searched under a shared check
//!   budget. Approximate: it may return a slightly worse neighbor, but its
//!   query cost is sublinear in the reference size. All randomness is
//!   seeded from a fixed constant so results are reproducible.
//! - **Brute force** - exact scan. Preserves true ranking; the slower but
//!   always-valid substitute.
//!
//! The backend is chosen through an explicit [`IndexConfig`] validated once
//! at startup.

mod kdtree;

pub(crate) use kdtree::KdForestIndex;

use crate::core::features::Descriptor;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Default number of randomized trees
pub const DEFAULT_TREES: usize = 10;
/// Default search-check budget (descriptor evaluations per query)
pub const DEFAULT_CHECKS: usize = 50;

/// Which search backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexKind {
    /// Randomized kd-forest (approximate)
    KdForest,
    /// Exact linear scan
    BruteForce,
}

/// Structured configuration for the neighbor index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    pub kind: IndexKind,
    /// Number of randomized trees (kd-forest only)
    pub trees: usize,
    /// Descriptor evaluations allowed per query (kd-forest only)
    pub checks: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            kind: IndexKind::KdForest,
            trees: DEFAULT_TREES,
            checks: DEFAULT_CHECKS,
        }
    }
}

impl IndexConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.kind == IndexKind::KdForest {
            if self.trees == 0 {
                return Err(ConfigError::NoTrees);
            }
            if self.checks == 0 {
                return Err(ConfigError::NoChecks);
            }
        }
        Ok(())
    }
}

/// The two nearest reference descriptors for one query descriptor
#[derive(Debug, Clone, Copy)]
pub struct TwoNearest {
    /// Index of the nearest reference descriptor
    pub index: usize,
    /// Distance to the nearest
    pub distance: f32,
    /// Distance to the second-nearest, when one exists
    pub second_distance: Option<f32>,
}

/// Trait for nearest-neighbor backends
pub trait NeighborIndex: Sync {
    /// Find the two nearest reference descriptors.
    ///
    /// Returns `None` only when the reference set is empty.
    fn nearest_two(&self, query: &Descriptor) -> Option<TwoNearest>;

    /// Number of indexed descriptors
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Build an index over the reference descriptors per the configuration.
pub fn build_index<'a>(
    descriptors: &'a [Descriptor],
    config: &IndexConfig,
) -> Box<dyn NeighborIndex + 'a> {
    match config.kind {
        IndexKind::BruteForce => Box::new(BruteForceIndex { descriptors }),
        IndexKind::KdForest => Box::new(KdForestIndex::build(
            descriptors,
            config.trees,
            config.checks,
        )),
    }
}

/// Exact nearest-neighbor search by linear scan.
pub struct BruteForceIndex<'a> {
    descriptors: &'a [Descriptor],
}

impl<'a> BruteForceIndex<'a> {
    pub fn new(descriptors: &'a [Descriptor]) -> Self {
        Self { descriptors }
    }
}

impl NeighborIndex for BruteForceIndex<'_> {
    fn nearest_two(&self, query: &Descriptor) -> Option<TwoNearest> {
        if self.descriptors.is_empty() {
            return None;
        }

        let mut best_sq = f32::INFINITY;
        let mut second_sq = f32::INFINITY;
        let mut best_index = 0usize;

        for (i, descriptor) in self.descriptors.iter().enumerate() {
            let sq = query.distance_squared(descriptor);
            if sq < best_sq {
                second_sq = best_sq;
                best_sq = sq;
                best_index = i;
            } else if sq < second_sq {
                second_sq = sq;
            }
        }

        Some(TwoNearest {
            index: best_index,
            distance: best_sq.sqrt(),
            second_distance: second_sq.is_finite().then(|| second_sq.sqrt()),
        })
    }

    fn len(&self) -> usize {
        self.descriptors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::features::DESCRIPTOR_DIM;

    fn descriptor_at(dim: usize, value: f32) -> Descriptor {
        let mut values = [0.0f32; DESCRIPTOR_DIM];
        values[dim] = value;
        Descriptor::new(values)
    }

    #[test]
    fn brute_force_finds_the_true_nearest() {
        let reference = vec![
            descriptor_at(0, 10.0),
            descriptor_at(0, 1.0),
            descriptor_at(0, 5.0),
        ];
        let index = BruteForceIndex::new(&reference);

        let neighbors = index.nearest_two(&descriptor_at(0, 0.0)).unwrap();
        assert_eq!(neighbors.index, 1);
        assert!((neighbors.distance - 1.0).abs() < 1e-6);
        assert!((neighbors.second_distance.unwrap() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn brute_force_on_empty_reference_returns_none() {
        let reference: Vec<Descriptor> = Vec::new();
        let index = BruteForceIndex::new(&reference);
        assert!(index.nearest_two(&descriptor_at(0, 0.0)).is_none());
    }

    #[test]
    fn single_reference_has_no_second_neighbor() {
        let reference = vec![descriptor_at(0, 2.0)];
        let index = BruteForceIndex::new(&reference);

        let neighbors = index.nearest_two(&descriptor_at(0, 0.0)).unwrap();
        assert_eq!(neighbors.index, 0);
        assert!(neighbors.second_distance.is_none());
    }

    #[test]
    fn kd_forest_finds_a_stored_descriptor_exactly() {
        let reference: Vec<Descriptor> = (0..64)
            .map(|i| descriptor_at(i % DESCRIPTOR_DIM, 1.0 + i as f32))
            .collect();
        let config = IndexConfig {
            kind: IndexKind::KdForest,
            trees: 4,
            checks: 128,
        };
        let index = build_index(&reference, &config);

        let neighbors = index.nearest_two(&reference[17].clone()).unwrap();
        assert_eq!(neighbors.index, 17);
        assert_eq!(neighbors.distance, 0.0);
    }

    #[test]
    fn kd_forest_is_deterministic() {
        let reference: Vec<Descriptor> = (0..100)
            .map(|i| descriptor_at(i % DESCRIPTOR_DIM, (i as f32 * 0.37).sin() * 10.0))
            .collect();
        let config = IndexConfig {
            kind: IndexKind::KdForest,
            trees: 4,
            checks: 32,
        };

        let query = descriptor_at(3, 0.5);
        let first = build_index(&reference, &config).nearest_two(&query).unwrap();
        let second = build_index(&reference, &config).nearest_two(&query).unwrap();

        assert_eq!(first.index, second.index);
        assert_eq!(first.distance, second.distance);
    }

    #[test]
    fn config_validation_rejects_zero_trees_and_checks() {
        let no_trees = IndexConfig {
            kind: IndexKind::KdForest,
            trees: 0,
            checks: 50,
        };
        assert!(no_trees.validate().is_err());

        let no_checks = IndexConfig {
            kind: IndexKind::KdForest,
            trees: 10,
            checks: 0,
        };
        assert!(no_checks.validate().is_err());

        // Brute force ignores the kd-forest knobs
        let brute = IndexConfig {
            kind: IndexKind::BruteForce,
            trees: 0,
            checks: 0,
        };
        assert!(brute.validate().is_ok());
    }
}
