//! # visual-triage CLI
//!
//! Command-line interface for the visual triage engine.
//!
//! ## Usage
//! ```bash
//! visual-triage run ./unknowns --catalog ./catalog --threshold 20
//! visual-triage run ./unknowns --catalog ./catalog --visualize ./out --output json
//! ```

mod cli;

use visual_triage::Result;

fn main() -> Result<()> {
    visual_triage::init_tracing();
    cli::run()
}
