//! # Error Module
//!
//! Error types for the visual triage engine.
//!
//! ## Design Principles
//! - **Never panic** on user data - return errors instead
//! - **Include context** - paths, names, what went wrong
//! - Per-image failures (undecodable file, featureless image) are not fatal:
//!   they are recorded and the scan proceeds. Only invalid configuration
//!   refuses to run.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum TriageError {
    #[error("Image loading error: {0}")]
    Load(#[from] LoadError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Visualization error: {0}")]
    Render(#[from] RenderError),

    #[error("Report output error: {0}")]
    Report(String),
}

/// Errors that occur while listing and decoding images
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("Failed to read directory {path}: {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode image {path}: {reason}")]
    Decode { path: PathBuf, reason: String },
}

/// Invalid configuration, rejected once at startup.
///
/// This is the only error class that stops a run: everything after
/// validation is a pure computation over already-loaded data.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid ratio-test constant {value}: must be greater than 0 and less than 1")]
    InvalidRatio { value: f32 },

    #[error("Kd-forest index needs at least one tree")]
    NoTrees,

    #[error("Kd-forest index needs a positive search-check budget")]
    NoChecks,

    #[error("Feature extractor needs at least one pyramid level")]
    NoPyramidLevels,

    #[error("Pyramid scale factor {value} must be greater than 1")]
    InvalidScaleFactor { value: f32 },

    #[error("Feature extractor needs a positive keypoint capacity")]
    NoFeatureCapacity,
}

/// Errors from the visualization sink
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to create visualization directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write visualization {path}: {reason}")]
    Write { path: PathBuf, reason: String },
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, TriageError>;
