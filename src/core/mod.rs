//! # Core Module
//!
//! The UI-agnostic triage engine.
//!
//! ## Modules
//! - `loader` - lists and decodes images from directories
//! - `features` - extracts keypoints and descriptors from an image
//! - `index` - nearest-neighbor search over descriptor sets
//! - `matcher` - correspondences, ratio-test filtering, and scoring
//! - `triage` - best-of-catalog and duplicate scans
//! - `render` - side-by-side match visualization
//! - `pipeline` - orchestrates the full workflow

pub mod features;
pub mod index;
#[cfg(test)]
pub(crate) mod testutil;
pub mod loader;
pub mod matcher;
pub mod pipeline;
pub mod render;
pub mod triage;

// Re-export commonly used types
pub use features::{FeatureSet, Keypoint, PyramidExtractor, DESCRIPTOR_DIM};
pub use index::{IndexConfig, IndexKind};
pub use matcher::{GoodMatch, MatchResult, MatcherConfig, PairComparator};
pub use pipeline::{Outcome, TriagePipeline, TriageResult, UnknownReport};
pub use render::{MatchSink, MatchView, NullSink, PngSink};
