//! Subcommand implementations.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use pickture_core::decode::read_source;
use pickture_core::histogram::BIN_COUNT;
use pickture_core::output::save_selection;
use pickture_core::scan::scan_folder;
use pickture_core::{
    brightness_histogram, process_file, CancellationToken, CustomLevels, EngineConfig,
    FsImageSource, PrecomputeCoordinator, RotateParams, TransformKind,
};

use crate::Mode;

/// Build the transform for a CLI mode, validating its parameters.
pub fn transform_kind(
    mode: Mode,
    low: f64,
    high: f64,
    gamma: f64,
    angle: f64,
    no_crop: bool,
) -> anyhow::Result<TransformKind> {
    Ok(match mode {
        Mode::Original => TransformKind::Original,
        Mode::WbValue => TransformKind::WhiteBalanceValue,
        Mode::WbRgb => TransformKind::WhiteBalanceRgb,
        Mode::Custom => TransformKind::Custom(CustomLevels::new(low, high, gamma)?),
        Mode::Rotate => TransformKind::Rotate(RotateParams::new(angle, !no_crop)?),
    })
}

pub fn run_scan(dir: &Path) -> anyhow::Result<()> {
    let entries = scan_folder(dir)?;
    if entries.is_empty() {
        println!("No images in {}", dir.display());
        return Ok(());
    }

    for entry in &entries {
        println!("{:>10}  {}", format_size(entry.size_bytes), entry.file_name);
    }
    println!("{} images", entries.len());
    Ok(())
}

pub fn run_process(
    config: &EngineConfig,
    file: &Path,
    kind: TransformKind,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let started = Instant::now();
    let bytes = process_file(file, &kind, &config.enhance, &CancellationToken::new())
        .with_context(|| format!("Failed to process {}", file.display()))?;

    let target = match output {
        Some(path) => {
            fs::write(path, &bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            path.to_path_buf()
        }
        None => save_selection(file, &kind, &bytes)?,
    };

    println!(
        "{} -> {} ({}, {:.0?})",
        kind,
        target.display(),
        format_size(bytes.len() as u64),
        started.elapsed()
    );
    Ok(())
}

pub fn run_histogram(file: &Path, rows: usize) -> anyhow::Result<()> {
    let raw = read_source(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let hist = brightness_histogram(&raw)?;

    let rows = rows.clamp(1, BIN_COUNT);
    let per_row = BIN_COUNT.div_ceil(rows);
    let sums: Vec<u64> = hist
        .bins
        .chunks(per_row)
        .map(|chunk| chunk.iter().map(|&c| c as u64).sum())
        .collect();
    let peak = sums.iter().copied().max().unwrap_or(0).max(1);

    const BAR_WIDTH: u64 = 60;
    for (row, &sum) in sums.iter().enumerate() {
        let start = row * per_row;
        let end = (start + per_row - 1).min(BIN_COUNT - 1);
        let bar = "#".repeat((sum * BAR_WIDTH / peak) as usize);
        println!("{:>3}-{:<3} {:>9} {}", start, end, sum, bar);
    }
    println!("{} pixels", hist.total());
    Ok(())
}

/// Walk a folder in order, selecting each image and reading both white
/// balance variants back through the coordinator.
pub fn run_preview(config: &EngineConfig, dir: &Path, save: bool) -> anyhow::Result<()> {
    let entries = scan_folder(dir)?;
    let coordinator = PrecomputeCoordinator::from_config(config, Arc::new(FsImageSource))?;

    for entry in &entries {
        let started = Instant::now();
        let job = coordinator.select(&entry.path);

        for kind in TransformKind::PRECOMPUTED {
            let cached = coordinator.peek(&entry.path, &kind).is_some();
            match coordinator.fetch(&entry.path, &kind) {
                Ok(bytes) => {
                    let label = kind.to_string();
                    println!(
                        "{}  {:<22} {:>10}{}",
                        entry.file_name,
                        label,
                        format_size(bytes.len() as u64),
                        if cached { "  (cached)" } else { "" }
                    );
                    if save {
                        save_selection(&entry.path, &kind, &bytes)?;
                    }
                }
                Err(err) => {
                    tracing::warn!(file = %entry.file_name, %kind, error = %err, "Preview failed");
                }
            }
        }

        let summary = job.wait();
        tracing::debug!(
            file = %entry.file_name,
            stored = summary.stored,
            elapsed = ?started.elapsed(),
            "Image done"
        );
    }

    println!(
        "{} images, {} cached results",
        entries.len(),
        coordinator.cache().len()
    );
    Ok(())
}

fn format_size(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KIB {
        format!("{} B", bytes)
    } else if b < KIB * KIB {
        format!("{:.1} KiB", b / KIB)
    } else {
        format!("{:.1} MiB", b / (KIB * KIB))
    }
}
