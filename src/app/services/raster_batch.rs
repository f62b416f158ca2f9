//! Concurrent raster batch processing
//!
//! Each raster file is an independent task: decode its name, read and
//! normalize it, then compute zonal means for every district of the shared
//! registry. Tasks run on the blocking pool with a bounded number in flight,
//! and their outcomes are folded into one [`BatchReport`]. A failure in one
//! file never stops the others.

use crate::app::models::{RasterKey, VegetationObservation};
use crate::app::services::district_registry::DistrictRegistry;
use crate::app::services::filename_decoder::{DecodeError, FilenameDecoder, is_raster_file};
use crate::app::services::raster_reader::read_raster;
use crate::app::services::zonal_stats::zonal_means;
use crate::{Error, Result};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// What happened to one raster file
#[derive(Debug)]
pub enum FileOutcome {
    /// Zonal means computed for every district
    Processed {
        path: PathBuf,
        key: RasterKey,
        observations: Vec<VegetationObservation>,
    },

    /// Filename does not follow the canonical grammar
    ParseSkipped { path: PathBuf, error: DecodeError },

    /// File could not be opened or is not a usable single-band raster
    IoFailed { path: PathBuf, error: Error },
}

/// Aggregated result of a raster batch
#[derive(Debug, Default)]
pub struct BatchReport {
    pub files_total: usize,
    pub processed: usize,
    pub parse_skipped: Vec<(PathBuf, DecodeError)>,
    pub io_failed: Vec<(PathBuf, Error)>,

    /// Files never started because the batch was cancelled
    pub cancelled: usize,

    /// Every observation of every processed file
    pub observations: Vec<VegetationObservation>,

    pub duration: Duration,
}

impl BatchReport {
    fn new(files_total: usize) -> Self {
        Self {
            files_total,
            ..Default::default()
        }
    }

    /// Fold one file outcome into the report
    pub fn record(&mut self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Processed {
                path,
                key,
                observations,
            } => {
                debug!(
                    "Processed {} ({}-{:02}, {} districts)",
                    path.display(),
                    key.year(),
                    key.month(),
                    observations.len()
                );
                self.processed += 1;
                self.observations.extend(observations);
            }
            FileOutcome::ParseSkipped { path, error } => {
                warn!("Skipping {}: {}", path.display(), error);
                self.parse_skipped.push((path, error));
            }
            FileOutcome::IoFailed { path, error } => {
                error!("Failed to read raster {}: {}", path.display(), error);
                self.io_failed.push((path, error));
            }
        }
    }

    /// Files that were started but produced no observations
    pub fn failed(&self) -> usize {
        self.parse_skipped.len() + self.io_failed.len()
    }

    pub fn was_cancelled(&self) -> bool {
        self.cancelled > 0
    }
}

/// Raster files below `dir`, sorted by path
///
/// A missing or unreadable directory is an error; unreadable entries below it
/// are skipped with a warning.
pub fn discover_rasters(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(Error::io(
            format!("Raster directory {} not found", dir.display()),
            std::io::Error::new(std::io::ErrorKind::NotFound, dir.display().to_string()),
        ));
    }

    let mut rasters = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(Error::directory_traversal(
                    format!("Failed to scan raster directory {}", dir.display()),
                    e,
                ));
            }
            Err(e) => {
                warn!("Skipping unreadable entry below {}: {}", dir.display(), e);
                continue;
            }
        };
        if entry.file_type().is_file() && is_raster_file(entry.path()) {
            rasters.push(entry.into_path());
        }
    }
    rasters.sort();

    debug!("Discovered {} rasters in {}", rasters.len(), dir.display());
    Ok(rasters)
}

/// Decode, read and aggregate one raster
pub fn process_file(
    path: &Path,
    decoder: &FilenameDecoder,
    registry: &DistrictRegistry,
) -> FileOutcome {
    let decoded = match decoder.decode_path(path) {
        Ok(decoded) => decoded,
        Err(error) => {
            return FileOutcome::ParseSkipped {
                path: path.to_path_buf(),
                error,
            };
        }
    };

    match read_raster(path) {
        Ok(frame) => {
            if frame.valid_count() == 0 {
                warn!(
                    "{} has no valid pixels; every district mean will be missing",
                    path.display()
                );
            }
            FileOutcome::Processed {
                path: path.to_path_buf(),
                observations: zonal_means(&frame, registry, &decoded.key),
                key: decoded.key,
            }
        }
        Err(error) => FileOutcome::IoFailed {
            path: path.to_path_buf(),
            error,
        },
    }
}

/// Process rasters with at most `workers` files in flight
///
/// Cancelling `cancel` stops new files from starting; files already running
/// finish and are reported normally.
pub async fn process_rasters(
    paths: Vec<PathBuf>,
    registry: Arc<DistrictRegistry>,
    workers: usize,
    cancel: CancellationToken,
    show_progress: bool,
) -> Result<BatchReport> {
    let start = Instant::now();
    let total = paths.len();
    let decoder = Arc::new(FilenameDecoder::new()?);

    info!(
        "Processing {} rasters for {} with {} workers",
        total,
        registry.state(),
        workers.max(1)
    );

    let progress = show_progress.then(|| {
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg} ETA: {eta}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb.set_message(format!("{} rasters", registry.state()));
        pb
    });

    let mut report = stream::iter(paths)
        .map(|path| {
            let decoder = Arc::clone(&decoder);
            let registry = Arc::clone(&registry);
            let cancel = cancel.clone();
            async move {
                if cancel.is_cancelled() {
                    return None;
                }
                let task_path = path.clone();
                let outcome = tokio::task::spawn_blocking(move || {
                    process_file(&task_path, &decoder, &registry)
                })
                .await
                .unwrap_or_else(|e| FileOutcome::IoFailed {
                    path,
                    error: Error::processing_interrupted(format!("raster task failed: {}", e)),
                });
                Some(outcome)
            }
        })
        .buffer_unordered(workers.max(1))
        .fold(BatchReport::new(total), |mut report, outcome| {
            if let Some(pb) = &progress {
                pb.inc(1);
            }
            match outcome {
                Some(outcome) => report.record(outcome),
                None => report.cancelled += 1,
            }
            futures::future::ready(report)
        })
        .await;

    if let Some(pb) = progress {
        pb.finish_with_message(format!("{} rasters done", registry.state()));
    }

    report.duration = start.elapsed();
    if report.was_cancelled() {
        warn!(
            "Raster batch cancelled: {} of {} files not started",
            report.cancelled, total
        );
    }
    info!(
        "Raster batch finished: {} processed, {} skipped, {} failed in {:.1}s",
        report.processed,
        report.parse_skipped.len(),
        report.io_failed.len(),
        report.duration.as_secs_f64()
    );

    Ok(report)
}
