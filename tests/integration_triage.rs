//! End-to-end tests for the triage pipeline against real files on disk.

use image::{GrayImage, Luma};
use std::path::Path;
use tempfile::TempDir;
use visual_triage::core::features::ExtractorConfig;
use visual_triage::core::index::{IndexConfig, IndexKind};
use visual_triage::core::matcher::MatcherConfig;
use visual_triage::core::pipeline::{Outcome, TriagePipeline, TriageResult};
use visual_triage::core::render::{NullSink, PngSink};

/// Deterministic synthetic photo: high-contrast discs over per-pixel noise.
/// Distinct seeds produce visually unrelated images.
fn synthetic_photo(seed: u64, width: u32, height: u32) -> GrayImage {
    let mut state = (seed << 1) | 1;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };

    let mut image = GrayImage::from_pixel(width, height, Luma([128u8]));

    for y in 0..height {
        for x in 0..width {
            let delta = (next() % 61) as i32 - 30;
            image.put_pixel(x, y, Luma([(128 + delta).clamp(0, 255) as u8]));
        }
    }

    for _ in 0..200 {
        let cx = (next() % width as u64) as i32;
        let cy = (next() % height as u64) as i32;
        let radius = 2 + (next() % 4) as i32;
        let value = if next() % 2 == 0 { 10u8 } else { 245u8 };
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy > radius * radius {
                    continue;
                }
                let px = cx + dx;
                let py = cy + dy;
                if px >= 0 && py >= 0 && (px as u32) < width && (py as u32) < height {
                    image.put_pixel(px as u32, py as u32, Luma([value]));
                }
            }
        }
    }

    image
}

fn save_photo(dir: &Path, name: &str, seed: u64) {
    synthetic_photo(seed, 200, 200).save(dir.join(name)).unwrap();
}

struct Fixture {
    _root: TempDir,
    unknowns: std::path::PathBuf,
    catalog: std::path::PathBuf,
}

fn fixture() -> Fixture {
    let root = tempfile::tempdir().unwrap();
    let unknowns = root.path().join("unknowns");
    let catalog = root.path().join("catalog");
    std::fs::create_dir(&unknowns).unwrap();
    std::fs::create_dir(&catalog).unwrap();
    Fixture {
        _root: root,
        unknowns,
        catalog,
    }
}

fn brute_matcher() -> MatcherConfig {
    MatcherConfig {
        index: IndexConfig {
            kind: IndexKind::BruteForce,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// A lower keypoint budget keeps the tests fast
fn extractor() -> ExtractorConfig {
    ExtractorConfig {
        max_features: 300,
        ..Default::default()
    }
}

fn run(fx: &Fixture, with_catalog: bool) -> TriageResult {
    let mut builder = TriagePipeline::builder(&fx.unknowns)
        .matcher(brute_matcher())
        .extractor(extractor());
    if with_catalog {
        builder = builder.catalog_dir(&fx.catalog);
    }
    builder.build().unwrap().run(&NullSink).unwrap()
}

#[test]
fn an_exact_copy_is_identified_against_the_catalog() {
    let fx = fixture();
    save_photo(&fx.catalog, "ref_a.png", 1);
    save_photo(&fx.catalog, "ref_b.png", 2);
    save_photo(&fx.unknowns, "mystery.png", 1);

    let result = run(&fx, true);
    assert_eq!(result.reports.len(), 1);

    match &result.reports[0].outcome {
        Outcome::Identified { name, score } => {
            assert_eq!(name, "ref_a.png");
            assert!(*score > 20, "identification score {} too low", score);
        }
        Outcome::Unknown => panic!("exact copy was not identified"),
    }
}

#[test]
fn an_unrelated_image_stays_unknown() {
    let fx = fixture();
    save_photo(&fx.catalog, "ref_a.png", 3);
    save_photo(&fx.catalog, "ref_b.png", 4);
    save_photo(&fx.unknowns, "stranger.png", 5);

    let result = run(&fx, true);
    assert_eq!(result.reports[0].outcome, Outcome::Unknown);
}

#[test]
fn duplicate_unknowns_report_each_other() {
    let fx = fixture();
    save_photo(&fx.unknowns, "first.png", 6);
    save_photo(&fx.unknowns, "second.png", 6);
    save_photo(&fx.unknowns, "other.png", 7);

    let result = run(&fx, false);
    assert_eq!(result.reports.len(), 3);

    let by_name = |name: &str| {
        result
            .reports
            .iter()
            .find(|r| r.name == name)
            .unwrap_or_else(|| panic!("no report for {name}"))
    };

    let first = by_name("first.png");
    assert_eq!(first.duplicates.len(), 1);
    assert_eq!(first.duplicates[0].name, "second.png");
    assert!(first.duplicates[0].score > 20);

    let second = by_name("second.png");
    assert_eq!(second.duplicates.len(), 1);
    assert_eq!(second.duplicates[0].name, "first.png");

    assert!(by_name("other.png").duplicates.is_empty());
}

#[test]
fn a_featureless_image_is_triaged_without_crashing() {
    let fx = fixture();
    save_photo(&fx.catalog, "ref.png", 8);
    GrayImage::from_pixel(150, 150, Luma([128u8]))
        .save(fx.unknowns.join("blank.png"))
        .unwrap();
    save_photo(&fx.unknowns, "normal.png", 9);

    let result = run(&fx, true);
    assert_eq!(result.reports.len(), 2);

    let blank = result
        .reports
        .iter()
        .find(|r| r.name == "blank.png")
        .unwrap();
    assert_eq!(blank.outcome, Outcome::Unknown);
    assert!(blank.duplicates.is_empty());
}

#[test]
fn kd_forest_runs_are_reproducible() {
    let fx = fixture();
    save_photo(&fx.catalog, "ref.png", 10);
    save_photo(&fx.unknowns, "a.png", 10);
    save_photo(&fx.unknowns, "b.png", 11);

    let run_once = || {
        TriagePipeline::builder(&fx.unknowns)
            .catalog_dir(&fx.catalog)
            .extractor(extractor())
            .build()
            .unwrap()
            .run(&NullSink)
            .unwrap()
    };

    let first = run_once();
    let second = run_once();

    assert_eq!(first.reports.len(), second.reports.len());
    for (a, b) in first.reports.iter().zip(&second.reports) {
        assert_eq!(a.name, b.name);
        assert_eq!(a.outcome, b.outcome);
        assert_eq!(a.duplicates.len(), b.duplicates.len());
        for (da, db) in a.duplicates.iter().zip(&b.duplicates) {
            assert_eq!(da.name, db.name);
            assert_eq!(da.score, db.score);
        }
    }
}

#[test]
fn a_prohibitive_threshold_identifies_nothing() {
    let fx = fixture();
    save_photo(&fx.catalog, "ref.png", 12);
    save_photo(&fx.unknowns, "copy.png", 12);

    let result = TriagePipeline::builder(&fx.unknowns)
        .catalog_dir(&fx.catalog)
        .matcher(brute_matcher())
        .extractor(extractor())
        .threshold(1_000_000)
        .build()
        .unwrap()
        .run(&NullSink)
        .unwrap();

    assert_eq!(result.reports[0].outcome, Outcome::Unknown);
}

#[test]
fn raising_the_threshold_never_adds_reports() {
    let fx = fixture();
    save_photo(&fx.catalog, "ref.png", 20);
    save_photo(&fx.unknowns, "copy.png", 20);
    save_photo(&fx.unknowns, "twin.png", 20);
    save_photo(&fx.unknowns, "stray.png", 21);

    let run_at = |threshold: u32| {
        TriagePipeline::builder(&fx.unknowns)
            .catalog_dir(&fx.catalog)
            .matcher(brute_matcher())
            .extractor(extractor())
            .threshold(threshold)
            .build()
            .unwrap()
            .run(&NullSink)
            .unwrap()
    };

    let mut previous_identified = usize::MAX;
    let mut previous_duplicates = usize::MAX;
    for threshold in [0, 20, 100, 10_000] {
        let result = run_at(threshold);
        let identified = result.identified_count();
        let duplicates = result.duplicate_report_count();
        assert!(identified <= previous_identified);
        assert!(duplicates <= previous_duplicates);
        previous_identified = identified;
        previous_duplicates = duplicates;
    }
}

#[test]
fn visualizations_are_written_for_reported_comparisons() {
    let fx = fixture();
    save_photo(&fx.catalog, "ref.png", 13);
    save_photo(&fx.unknowns, "copy.png", 13);
    save_photo(&fx.unknowns, "twin.png", 13);

    let viz = fx._root.path().join("viz");
    let sink = PngSink::new(viz.clone()).unwrap();

    TriagePipeline::builder(&fx.unknowns)
        .catalog_dir(&fx.catalog)
        .matcher(brute_matcher())
        .extractor(extractor())
        .build()
        .unwrap()
        .run(&sink)
        .unwrap();

    let written: Vec<String> = std::fs::read_dir(&viz)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();

    // Both unknowns are identified and each reports the other as a
    // duplicate: two MATCH images and two DUPLICATE images
    assert!(written.iter().any(|n| n.starts_with("MATCH") && n.contains("copy")));
    assert!(written.iter().any(|n| n.starts_with("MATCH") && n.contains("twin")));
    assert!(written.iter().any(|n| n.starts_with("DUPLICATE")));
    assert_eq!(written.len(), 4);
}

#[test]
fn an_empty_unknowns_directory_produces_an_empty_report() {
    let fx = fixture();
    save_photo(&fx.catalog, "ref.png", 14);

    let result = run(&fx, true);
    assert!(result.reports.is_empty());
    assert_eq!(result.unknown_images, 0);
    assert_eq!(result.catalog_images, 1);
    assert!(result.errors.is_empty());
}
