//! # Visual Triage
//!
//! Determines whether unidentified images correspond to known reference
//! images, and whether two unidentified images are duplicates of each other,
//! using local visual feature matching rather than pixel comparison.
//!
//! ## How it works
//! 1. Extract keypoints and descriptors from every image once
//! 2. For each pair, find the two nearest reference descriptors per query
//! 3. Keep only unambiguous correspondences (Lowe's ratio test)
//! 4. The surviving match count is the similarity score
//! 5. Score the unknown against the catalog (best-of-N) and against the
//!    other unknowns (every pair above the threshold)
//!
//! ## Architecture
//! The library is split into a core engine and presentation layers:
//! - `core` - feature extraction, matching, and triage scans
//! - `events` - event-driven progress reporting
//! - `error` - error types with context

pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use error::{Result, TriageError};

/// Initialize tracing for the library
///
/// This should be called once by the application entry point.
pub fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set global default tracing subscriber");
}
