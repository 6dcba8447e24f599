//! Event type definitions for progress reporting.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// All events emitted by the triage pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Image loading phase events
    Load(LoadEvent),
    /// Feature extraction phase events
    Extract(ExtractEvent),
    /// Matching phase events
    Match(MatchEvent),
    /// Pipeline-level events
    Pipeline(PipelineEvent),
}

/// Events during image loading
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LoadEvent {
    /// Loading from a directory has started
    Started { path: PathBuf },
    /// An image was decoded successfully
    ImageLoaded { path: PathBuf },
    /// An image could not be decoded; it is skipped, loading continues
    Error { path: PathBuf, message: String },
    /// Loading completed
    Completed { total_images: usize },
}

/// Events during feature extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExtractEvent {
    /// Extraction has started
    Started { total_images: usize },
    /// Progress update
    Progress(ExtractProgress),
    /// Extraction completed
    Completed {
        total_extracted: usize,
        /// Images that produced no keypoints at all
        empty_sets: usize,
    },
}

/// Progress information during feature extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractProgress {
    /// Number of images processed so far
    pub completed: usize,
    /// Total number of images to process
    pub total: usize,
    /// Name of the image just processed
    pub current: String,
}

/// Events during the matching phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MatchEvent {
    /// Matching has started
    Started { total_unknowns: usize },
    /// One unknown image has been scanned against catalog and peers
    UnknownProcessed {
        name: String,
        identified_as: Option<String>,
        duplicates: usize,
    },
    /// Matching completed
    Completed {
        identified: usize,
        duplicate_pairs: usize,
    },
}

/// Pipeline-level events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    /// Pipeline has started
    Started,
    /// Moving to a new phase
    PhaseChanged { phase: PipelinePhase },
    /// Pipeline completed successfully
    Completed { summary: TriageSummary },
}

/// Phases of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelinePhase {
    Loading,
    Extracting,
    Matching,
}

/// Summary of pipeline results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageSummary {
    /// Number of catalog images loaded
    pub catalog_images: usize,
    /// Number of unknown images loaded
    pub unknown_images: usize,
    /// Unknowns identified against the catalog
    pub identified: usize,
    /// Duplicate pairs reported among the unknowns
    pub duplicate_pairs: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl std::fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelinePhase::Loading => write!(f, "Loading"),
            PipelinePhase::Extracting => write!(f, "Extracting"),
            PipelinePhase::Matching => write!(f, "Matching"),
        }
    }
}
