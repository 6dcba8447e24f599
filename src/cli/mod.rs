//! # CLI Module
//!
//! Command-line interface for the visual triage tool.
//!
//! ## Usage
//! ```bash
//! # Identify unknowns against a catalog and find duplicates among them
//! visual-triage run ./unknowns --catalog ./catalog
//!
//! # Duplicate scan only
//! visual-triage run ./unknowns
//!
//! # Save side-by-side match images
//! visual-triage run ./unknowns --catalog ./catalog --visualize ./matches
//!
//! # JSON output
//! visual-triage run ./unknowns --output json
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::thread;
use visual_triage::core::index::{IndexConfig, IndexKind};
use visual_triage::core::matcher::MatcherConfig;
use visual_triage::core::pipeline::{Outcome, TriagePipeline, TriageResult};
use visual_triage::core::render::{MatchSink, NullSink, PngSink};
use visual_triage::error::Result;
use visual_triage::events::{
    Event, EventChannel, ExtractEvent, MatchEvent, PipelineEvent,
};

/// Visual Triage - identify unknown images and spot duplicates
#[derive(Parser, Debug)]
#[command(name = "visual-triage")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Triage a directory of unknown images
    Run {
        /// Directory of images to triage
        unknowns: PathBuf,

        /// Reference catalog directory; omit to only scan for duplicates
        #[arg(short, long)]
        catalog: Option<PathBuf>,

        /// Match score must exceed this to count (higher = stricter)
        #[arg(short, long, default_value = "20")]
        threshold: u32,

        /// Distance-ratio test constant, in (0, 1)
        #[arg(short, long, default_value = "0.7")]
        ratio: f32,

        /// Nearest-neighbor search backend
        #[arg(long, default_value = "kd-forest")]
        index: IndexBackend,

        /// Number of randomized trees (kd-forest only)
        #[arg(long, default_value = "10")]
        trees: usize,

        /// Search-check budget per query (kd-forest only)
        #[arg(long, default_value = "50")]
        checks: usize,

        /// Write side-by-side match images into this directory
        #[arg(long)]
        visualize: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum IndexBackend {
    /// Randomized kd-forest - fast, approximate (default)
    KdForest,
    /// Exact linear scan - slow, exact
    BruteForce,
}

impl From<IndexBackend> for IndexKind {
    fn from(backend: IndexBackend) -> Self {
        match backend {
            IndexBackend::KdForest => IndexKind::KdForest,
            IndexBackend::BruteForce => IndexKind::BruteForce,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
    /// One line per unidentified image
    Minimal,
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            unknowns,
            catalog,
            threshold,
            ratio,
            index,
            trees,
            checks,
            visualize,
            output,
            verbose,
        } => run_triage(
            unknowns, catalog, threshold, ratio, index, trees, checks, visualize, output, verbose,
        ),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_triage(
    unknowns: PathBuf,
    catalog: Option<PathBuf>,
    threshold: u32,
    ratio: f32,
    index: IndexBackend,
    trees: usize,
    checks: usize,
    visualize: Option<PathBuf>,
    output: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let term = Term::stderr();

    if matches!(output, OutputFormat::Pretty) {
        term.write_line(&format!(
            "{} {}",
            style("Visual Triage").bold().cyan(),
            style(env!("CARGO_PKG_VERSION")).dim()
        ))
        .ok();
        term.write_line("").ok();
    }

    let matcher = MatcherConfig {
        ratio,
        index: IndexConfig {
            kind: index.into(),
            trees,
            checks,
        },
    };

    let mut builder = TriagePipeline::builder(unknowns)
        .threshold(threshold)
        .matcher(matcher);
    if let Some(dir) = catalog {
        builder = builder.catalog_dir(dir);
    }
    let pipeline = builder.build()?;

    let sink: Box<dyn MatchSink> = match visualize {
        Some(dir) => Box::new(PngSink::new(dir)?),
        None => Box::new(NullSink),
    };

    let (sender, receiver) = EventChannel::new();

    let progress = if matches!(output, OutputFormat::Pretty) {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("█▓░"),
        );
        Some(pb)
    } else {
        None
    };

    let progress_clone = progress.clone();
    let verbose_clone = verbose;

    let event_thread = thread::spawn(move || {
        for event in receiver.iter() {
            match event {
                Event::Pipeline(PipelineEvent::PhaseChanged { phase }) => {
                    if let Some(ref pb) = progress_clone {
                        pb.set_message(format!("{}", phase));
                    }
                }
                Event::Extract(ExtractEvent::Started { total_images }) => {
                    if let Some(ref pb) = progress_clone {
                        pb.set_length(total_images as u64);
                        pb.set_position(0);
                    }
                }
                Event::Extract(ExtractEvent::Progress(p)) => {
                    if let Some(ref pb) = progress_clone {
                        pb.set_position(p.completed as u64);
                        if verbose_clone {
                            pb.set_message(p.current);
                        }
                    }
                }
                Event::Match(MatchEvent::Started { total_unknowns }) => {
                    if let Some(ref pb) = progress_clone {
                        pb.set_length(total_unknowns as u64);
                        pb.set_position(0);
                    }
                }
                Event::Match(MatchEvent::UnknownProcessed { name, .. }) => {
                    if let Some(ref pb) = progress_clone {
                        pb.inc(1);
                        if verbose_clone {
                            pb.set_message(name);
                        }
                    }
                }
                Event::Pipeline(PipelineEvent::Completed { .. }) => {
                    if let Some(ref pb) = progress_clone {
                        pb.finish_and_clear();
                    }
                }
                _ => {}
            }
        }
    });

    let result = pipeline.run_with_events(sink.as_ref(), &sender)?;

    drop(sender);
    event_thread.join().ok();

    match output {
        OutputFormat::Pretty => print_pretty_results(&term, &result),
        OutputFormat::Json => print_json_results(&result),
        OutputFormat::Minimal => print_minimal_results(&result),
    }

    Ok(())
}

fn print_pretty_results(term: &Term, result: &TriageResult) {
    term.write_line("").ok();
    term.write_line(&format!("{} Triage Complete", style("✓").green().bold()))
        .ok();
    term.write_line("").ok();

    term.write_line(&format!(
        "  {} unknown images against {} catalog entries in {:.1}s",
        style(result.unknown_images).cyan(),
        style(result.catalog_images).cyan(),
        result.duration_ms as f64 / 1000.0
    ))
    .ok();
    term.write_line(&format!(
        "  {} identified, {} duplicate reports",
        style(result.identified_count()).cyan(),
        style(result.duplicate_report_count()).cyan()
    ))
    .ok();
    term.write_line("").ok();

    for report in &result.reports {
        match &report.outcome {
            Outcome::Identified { name, score } => {
                term.write_line(&format!(
                    "  {} {} is {} ({})",
                    style("IDENTIFIED").green().bold(),
                    report.name,
                    style(name).bold(),
                    style(format!("score {}", score)).dim()
                ))
                .ok();
            }
            Outcome::Unknown => {
                term.write_line(&format!(
                    "  {} {}",
                    style("UNKNOWN").yellow().bold(),
                    report.name
                ))
                .ok();
            }
        }

        for duplicate in &report.duplicates {
            term.write_line(&format!(
                "    {} duplicate of {} ({})",
                style("≈").magenta(),
                duplicate.name,
                style(format!("score {}", duplicate.score)).dim()
            ))
            .ok();
        }
    }

    if !result.errors.is_empty() {
        term.write_line("").ok();
        term.write_line(&format!(
            "{}",
            style(format!("{} problem(s) during the run:", result.errors.len()))
                .yellow()
                .bold()
        ))
        .ok();
        for error in &result.errors {
            term.write_line(&format!("  {} {}", style("!").yellow(), error))
                .ok();
        }
    }
}

fn print_json_results(result: &TriageResult) {
    println!("{}", serde_json::to_string_pretty(result).unwrap());
}

/// One line per unknown that matched nothing in the catalog.
fn print_minimal_results(result: &TriageResult) {
    for report in &result.reports {
        if matches!(report.outcome, Outcome::Unknown) {
            println!("{}", report.name);
        }
    }
}
