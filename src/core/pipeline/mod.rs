//! # Pipeline Module
//!
//! Orchestrates the full triage workflow:
//!
//! 1. Load the unknown images (and the catalog, when one is configured)
//! 2. Extract features from every image once, in parallel
//! 3. For each unknown: find its best catalog entry, then scan the other
//!    unknowns for duplicates
//! 4. Hand every reported comparison to a [`MatchSink`] for visualization
//!
//! Per-image problems (undecodable files, featureless images, failed
//! renders) are recorded in the result and never abort the run. The
//! pipeline emits progress events throughout; with a null sender they cost
//! nothing.

use crate::core::features::{
    ExtractorConfig, FeatureExtractor, FeatureSet, PyramidExtractor,
};
use crate::core::loader::{DirectorySource, LoadedImage};
use crate::core::matcher::{MatcherConfig, PairComparator};
use crate::core::render::{MatchSink, MatchView};
use crate::core::triage::{Candidate, CatalogMatcher, DuplicateDetector};
use crate::error::{ConfigError, LoadError, Result};
use crate::events::{
    null_sender, Event, EventSender, ExtractEvent, ExtractProgress, MatchEvent, PipelineEvent,
    PipelinePhase, TriageSummary,
};
use image::GrayImage;
use rayon::prelude::*;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{info, warn};

/// Default identification threshold: a best score must exceed this
pub const DEFAULT_THRESHOLD: u32 = 20;

/// Configuration for a triage run
#[derive(Debug, Clone)]
pub struct TriageConfig {
    /// Reference catalog directory; identification is skipped when absent
    pub catalog_dir: Option<PathBuf>,
    /// Directory of images to triage
    pub unknowns_dir: PathBuf,
    /// Scores must strictly exceed this to count as a match
    pub threshold: u32,
    pub matcher: MatcherConfig,
    pub extractor: ExtractorConfig,
}

impl TriageConfig {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.matcher.validate()?;
        self.extractor.validate()
    }
}

/// Builder for [`TriagePipeline`]
pub struct TriageBuilder {
    config: TriageConfig,
}

impl TriageBuilder {
    pub fn catalog_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.catalog_dir = Some(dir.into());
        self
    }

    pub fn threshold(mut self, threshold: u32) -> Self {
        self.config.threshold = threshold;
        self
    }

    pub fn matcher(mut self, matcher: MatcherConfig) -> Self {
        self.config.matcher = matcher;
        self
    }

    pub fn extractor(mut self, extractor: ExtractorConfig) -> Self {
        self.config.extractor = extractor;
        self
    }

    /// Validate the configuration and construct the pipeline.
    pub fn build(self) -> Result<TriagePipeline> {
        self.config.validate()?;
        let extractor = PyramidExtractor::new(self.config.extractor.clone())?;
        let comparator = PairComparator::new(self.config.matcher.clone())?;
        Ok(TriagePipeline {
            config: self.config,
            extractor,
            comparator,
        })
    }
}

/// What the run concluded about one unknown image
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    /// The unknown depicts this catalog entry
    Identified { name: String, score: u32 },
    /// No catalog entry scored above the threshold
    Unknown,
}

/// Another unknown that scored above the threshold against this one
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateHit {
    pub name: String,
    pub score: u32,
}

/// The full verdict for one unknown image
#[derive(Debug, Clone, Serialize)]
pub struct UnknownReport {
    pub name: String,
    pub outcome: Outcome,
    pub duplicates: Vec<DuplicateHit>,
}

/// The result of a complete triage run
#[derive(Debug, Clone, Serialize)]
pub struct TriageResult {
    /// One report per unknown, in file-name order
    pub reports: Vec<UnknownReport>,
    pub catalog_images: usize,
    pub unknown_images: usize,
    /// Non-fatal problems encountered along the way
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

impl TriageResult {
    pub fn identified_count(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, Outcome::Identified { .. }))
            .count()
    }

    pub fn duplicate_report_count(&self) -> usize {
        self.reports.iter().map(|r| r.duplicates.len()).sum()
    }
}

/// One image with its extracted features, ready for matching
struct Entry {
    name: String,
    gray: GrayImage,
    features: FeatureSet,
}

/// The triage engine. Construct through [`TriagePipeline::builder`].
pub struct TriagePipeline {
    config: TriageConfig,
    extractor: PyramidExtractor,
    comparator: PairComparator,
}

impl TriagePipeline {
    pub fn builder(unknowns_dir: impl Into<PathBuf>) -> TriageBuilder {
        TriageBuilder {
            config: TriageConfig {
                catalog_dir: None,
                unknowns_dir: unknowns_dir.into(),
                threshold: DEFAULT_THRESHOLD,
                matcher: MatcherConfig::default(),
                extractor: ExtractorConfig::default(),
            },
        }
    }

    pub fn config(&self) -> &TriageConfig {
        &self.config
    }

    /// Run the pipeline without progress reporting.
    pub fn run(&self, sink: &dyn MatchSink) -> Result<TriageResult> {
        self.run_with_events(sink, &null_sender())
    }

    /// Run the pipeline, emitting progress events along the way.
    pub fn run_with_events(
        &self,
        sink: &dyn MatchSink,
        events: &EventSender,
    ) -> Result<TriageResult> {
        let start = Instant::now();
        let mut errors = Vec::new();

        events.send(Event::Pipeline(PipelineEvent::Started));
        events.send(Event::Pipeline(PipelineEvent::PhaseChanged {
            phase: PipelinePhase::Loading,
        }));

        let unknowns = match DirectorySource::load(&self.config.unknowns_dir, events) {
            Ok(outcome) => outcome,
            // A missing unknowns directory means there is nothing to
            // triage; report that rather than failing the run.
            Err(e @ LoadError::DirectoryNotFound { .. }) => {
                warn!(error = %e, "nothing to triage");
                errors.push(e.to_string());
                let result = TriageResult {
                    reports: Vec::new(),
                    catalog_images: 0,
                    unknown_images: 0,
                    errors,
                    duration_ms: start.elapsed().as_millis() as u64,
                };
                self.send_summary(events, &result);
                return Ok(result);
            }
            Err(e) => return Err(e.into()),
        };

        // An unreachable catalog disables identification but the duplicate
        // scan still has work to do
        let catalog = match &self.config.catalog_dir {
            Some(dir) => match DirectorySource::load(dir, events) {
                Ok(outcome) => outcome,
                Err(e @ LoadError::DirectoryNotFound { .. }) => {
                    warn!(error = %e, "catalog unavailable, identification disabled");
                    errors.push(e.to_string());
                    Default::default()
                }
                Err(e) => return Err(e.into()),
            },
            None => Default::default(),
        };

        errors.extend(unknowns.errors.iter().map(ToString::to_string));
        errors.extend(catalog.errors.iter().map(ToString::to_string));

        info!(
            unknowns = unknowns.images.len(),
            catalog = catalog.images.len(),
            "images loaded"
        );

        events.send(Event::Pipeline(PipelineEvent::PhaseChanged {
            phase: PipelinePhase::Extracting,
        }));
        let total = unknowns.images.len() + catalog.images.len();
        events.send(Event::Extract(ExtractEvent::Started {
            total_images: total,
        }));

        let counter = AtomicUsize::new(0);
        let unknown_entries = self.extract_all(unknowns.images, &counter, total, events);
        let catalog_entries = self.extract_all(catalog.images, &counter, total, events);

        let empty_sets = unknown_entries
            .iter()
            .chain(&catalog_entries)
            .filter(|e| e.features.is_empty())
            .count();
        events.send(Event::Extract(ExtractEvent::Completed {
            total_extracted: total,
            empty_sets,
        }));

        events.send(Event::Pipeline(PipelineEvent::PhaseChanged {
            phase: PipelinePhase::Matching,
        }));
        events.send(Event::Match(MatchEvent::Started {
            total_unknowns: unknown_entries.len(),
        }));

        let catalog_candidates: Vec<Candidate<'_>> = catalog_entries
            .iter()
            .map(|e| Candidate {
                name: &e.name,
                features: &e.features,
            })
            .collect();
        let unknown_candidates: Vec<Candidate<'_>> = unknown_entries
            .iter()
            .map(|e| Candidate {
                name: &e.name,
                features: &e.features,
            })
            .collect();

        let matcher = CatalogMatcher::new(&self.comparator, self.config.threshold);
        let detector = DuplicateDetector::new(&self.comparator, self.config.threshold);

        let mut reports = Vec::with_capacity(unknown_entries.len());

        for (i, entry) in unknown_entries.iter().enumerate() {
            let best = matcher.find_best(&entry.features, &catalog_candidates);

            let outcome = match &best {
                Some(scored) => {
                    let reference = &catalog_entries[scored.index];
                    let title = format!("MATCH: {} vs {}", entry.name, reference.name);
                    self.present(sink, &title, entry, reference, scored, &mut errors);
                    Outcome::Identified {
                        name: reference.name.clone(),
                        score: scored.result.score,
                    }
                }
                None => Outcome::Unknown,
            };

            let mut duplicates = Vec::new();
            for scored in detector.find_duplicates(i, &unknown_candidates) {
                let other = &unknown_entries[scored.index];
                let title = format!("DUPLICATE: {} vs {}", entry.name, other.name);
                self.present(sink, &title, entry, other, &scored, &mut errors);
                duplicates.push(DuplicateHit {
                    name: other.name.clone(),
                    score: scored.result.score,
                });
            }

            events.send(Event::Match(MatchEvent::UnknownProcessed {
                name: entry.name.clone(),
                identified_as: match &outcome {
                    Outcome::Identified { name, .. } => Some(name.clone()),
                    Outcome::Unknown => None,
                },
                duplicates: duplicates.len(),
            }));

            reports.push(UnknownReport {
                name: entry.name.clone(),
                outcome,
                duplicates,
            });
        }

        let result = TriageResult {
            catalog_images: catalog_entries.len(),
            unknown_images: unknown_entries.len(),
            reports,
            errors,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        events.send(Event::Match(MatchEvent::Completed {
            identified: result.identified_count(),
            duplicate_pairs: result.duplicate_report_count(),
        }));
        self.send_summary(events, &result);

        Ok(result)
    }

    fn extract_all(
        &self,
        images: Vec<LoadedImage>,
        counter: &AtomicUsize,
        total: usize,
        events: &EventSender,
    ) -> Vec<Entry> {
        images
            .into_par_iter()
            .map(|loaded| {
                let gray = loaded.image.to_luma8();
                let features = self.extractor.extract(&gray);
                let completed = counter.fetch_add(1, Ordering::SeqCst) + 1;
                events.send(Event::Extract(ExtractEvent::Progress(ExtractProgress {
                    completed,
                    total,
                    current: loaded.name.clone(),
                })));
                Entry {
                    name: loaded.name,
                    gray,
                    features,
                }
            })
            .collect()
    }

    /// Render one reported comparison; a failed render is recorded and the
    /// run continues.
    fn present(
        &self,
        sink: &dyn MatchSink,
        title: &str,
        query: &Entry,
        reference: &Entry,
        scored: &crate::core::triage::ScoredCandidate,
        errors: &mut Vec<String>,
    ) {
        let view = MatchView {
            title,
            image_a: &query.gray,
            features_a: &query.features,
            image_b: &reference.gray,
            features_b: &reference.features,
            matches: &scored.result.good_matches,
        };
        if let Err(e) = sink.present(&view) {
            warn!(title, error = %e, "visualization failed");
            errors.push(e.to_string());
        }
    }

    fn send_summary(&self, events: &EventSender, result: &TriageResult) {
        events.send(Event::Pipeline(PipelineEvent::Completed {
            summary: TriageSummary {
                catalog_images: result.catalog_images,
                unknown_images: result.unknown_images,
                identified: result.identified_count(),
                duplicate_pairs: result.duplicate_report_count(),
                duration_ms: result.duration_ms,
            },
        }));
    }
}
