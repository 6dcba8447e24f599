//! # Events Module
//!
//! Progress reporting from the core engine to any presentation layer.
//!
//! The engine never prints; it emits events on a channel and the CLI (or a
//! test) decides what to do with them. Dropping the receiver silently
//! disables reporting, so every pipeline entry point also works headless.

mod channel;
mod types;

pub use channel::{null_sender, EventChannel, EventReceiver, EventSender};
pub use types::{
    Event, ExtractEvent, ExtractProgress, LoadEvent, MatchEvent, PipelineEvent, PipelinePhase,
    TriageSummary,
};
