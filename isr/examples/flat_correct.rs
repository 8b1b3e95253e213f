//! Example: Flat-field correct a synthetic vignetted exposure
//!
//! Loads the sample policies from `isr/policies/` (or `ISR_POLICY_DIR`),
//! builds a science exposure and master flat sharing the same radial
//! falloff, runs the flat-field stage and reports how flat the result is.
//! Logs go to the console and to `test_output/logs/`.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example flat_correct
//! RUST_LOG=isr=debug cargo run --example flat_correct
//! ```

use std::env;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use common::log_setup::setup_logging;
use isr::{flat_field_correct, Exposure, FlatStatistics, Policy};

const COLS: usize = 512;
const ROWS: usize = 384;
const SKY_LEVEL: f32 = 850.0;
const FLAT_LEVEL: f32 = 22000.0;

fn main() -> anyhow::Result<()> {
    setup_logging("info", Path::new("test_output/logs"), "flat_correct")?;

    let policy_dir = env::var("ISR_POLICY_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| Path::new(env!("CARGO_MANIFEST_DIR")).join("policies"));
    tracing::info!(path = %policy_dir.display(), "Policy directory");

    let isr_policy = Policy::from_file(policy_dir.join("isr_policy.yaml"))
        .context("Failed to load ISR policy")?;
    let dataset_policy = Policy::from_file(policy_dir.join("dataset_policy.yaml"))
        .context("Failed to load dataset policy")?;

    let mut master_flat = vignetted(FLAT_LEVEL)
        .with_metadata("AMPID", 0)
        .with_metadata("FILTER", i64::from(b'r'));
    let mut science = vignetted(SKY_LEVEL)
        .with_metadata("AMPID", 0)
        .with_metadata("FILTER", i64::from(b'r'));

    let before = FlatStatistics::compute(&science);
    tracing::info!(
        "Science before: mean={:.2}, sigma={:.2} ({:.2}%)",
        before.mean,
        before.sigma,
        100.0 * before.sigma / before.mean
    );

    let start = Instant::now();
    let report = flat_field_correct(&mut science, &mut master_flat, &isr_policy, &dataset_policy)?;
    let elapsed = start.elapsed();

    if let Some(stats) = report.flat_statistics {
        tracing::info!(
            "Master flat: {} pixels, mean={:.2}, sigma={:.2}",
            stats.count,
            stats.mean,
            stats.sigma
        );
    }
    let after = FlatStatistics::compute(&science);
    tracing::info!(
        "Science after: mean={:.2}, sigma={:.4} ({:.4}%), scale={}, degenerate={}, took {:.1?}",
        after.mean,
        after.sigma,
        100.0 * after.sigma / after.mean,
        report.applied_scale,
        report.degenerate_pixels,
        elapsed
    );

    Ok(())
}

/// Uniform illumination at `level` seen through optics that lose 35% of the
/// light at the corners.
fn vignetted(level: f32) -> Exposure {
    let (cx, cy) = ((COLS - 1) as f32 / 2.0, (ROWS - 1) as f32 / 2.0);
    let r_max_sq = cx * cx + cy * cy;
    let pixels = (0..ROWS)
        .flat_map(|y| (0..COLS).map(move |x| (x, y)))
        .map(|(x, y)| {
            let (dx, dy) = (x as f32 - cx, y as f32 - cy);
            level * (1.0 - 0.35 * (dx * dx + dy * dy) / r_max_sq)
        })
        .collect();
    Exposure::from_pixels(COLS, ROWS, pixels)
}
