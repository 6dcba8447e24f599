//! # Triage Module
//!
//! Decision layer on top of pairwise scores: identify an unknown image
//! against a reference catalog and find its duplicates among the other
//! unknowns.
//!
//! Both operations compare the unknown against every candidate in parallel,
//! then reduce serially in candidate order so ties and thresholds resolve
//! the same way on every run.

use crate::core::features::FeatureSet;
use crate::core::matcher::{MatchResult, PairComparator};
use rayon::prelude::*;

/// A named feature set entered into a comparison
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub name: &'a str,
    pub features: &'a FeatureSet,
}

/// A candidate whose score survived the threshold
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    /// Position in the candidate list passed to the search
    pub index: usize,
    pub result: MatchResult,
}

/// Keep the single best result, by strictly-greater score, then gate it on
/// the threshold. On equal scores the earliest candidate wins.
fn select_best(results: Vec<MatchResult>, threshold: u32) -> Option<ScoredCandidate> {
    let mut best: Option<ScoredCandidate> = None;

    for (index, result) in results.into_iter().enumerate() {
        let improves = match &best {
            Some(current) => result.score > current.result.score,
            None => true,
        };
        if improves {
            best = Some(ScoredCandidate { index, result });
        }
    }

    best.filter(|candidate| candidate.result.score > threshold)
}

/// Identifies unknowns against a reference catalog.
pub struct CatalogMatcher<'c> {
    comparator: &'c PairComparator,
    threshold: u32,
}

impl<'c> CatalogMatcher<'c> {
    pub fn new(comparator: &'c PairComparator, threshold: u32) -> Self {
        Self {
            comparator,
            threshold,
        }
    }

    /// Find the catalog entry the unknown most plausibly depicts.
    ///
    /// Returns `None` when no candidate scores above the threshold, or when
    /// the catalog is empty.
    pub fn find_best(
        &self,
        unknown: &FeatureSet,
        catalog: &[Candidate<'_>],
    ) -> Option<ScoredCandidate> {
        let results: Vec<MatchResult> = catalog
            .par_iter()
            .map(|candidate| self.comparator.compare(unknown, candidate.features))
            .collect();

        select_best(results, self.threshold)
    }
}

/// Finds duplicates of an unknown among the other unknowns.
pub struct DuplicateDetector<'c> {
    comparator: &'c PairComparator,
    threshold: u32,
}

impl<'c> DuplicateDetector<'c> {
    pub fn new(comparator: &'c PairComparator, threshold: u32) -> Self {
        Self {
            comparator,
            threshold,
        }
    }

    /// Compare the unknown at `subject` against every other unknown and
    /// return all that score above the threshold, in list order.
    pub fn find_duplicates(
        &self,
        subject: usize,
        unknowns: &[Candidate<'_>],
    ) -> Vec<ScoredCandidate> {
        let results: Vec<(usize, MatchResult)> = unknowns
            .par_iter()
            .enumerate()
            .filter(|(index, _)| *index != subject)
            .map(|(index, candidate)| {
                (
                    index,
                    self.comparator
                        .compare(unknowns[subject].features, candidate.features),
                )
            })
            .collect();

        results
            .into_iter()
            .filter(|(_, result)| result.score > self.threshold)
            .map(|(index, result)| ScoredCandidate { index, result })
            .collect()
    }
}
