//! Row counting and progress reporting for both passes
//!
//! The input is pre-counted once so each pass can report a percentage. A
//! counting failure is not fatal: the passes fall back to a spinner with
//! absolute row counts.

use crate::constants::ROW_COUNT_LOG_INTERVAL;
use crate::error::{EtlError, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Count data records in a CSV file, stopping at `limit` if given
///
/// Counts records rather than lines so quoted fields containing newlines
/// are handled the same way the passes read them.
pub fn count_rows(path: &Path, limit: Option<usize>) -> Result<usize> {
    info!("Counting rows in {}", path.display());
    let start = Instant::now();

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| EtlError::input(path, "failed to open CSV file for counting", e))?;

    let mut record = csv::ByteRecord::new();
    let mut rows = 0usize;

    loop {
        if limit.is_some_and(|l| rows >= l) {
            break;
        }
        match reader.read_byte_record(&mut record) {
            Ok(true) => rows += 1,
            Ok(false) => break,
            Err(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => {
                return Err(EtlError::input(
                    path,
                    format!("counting failed after {} rows", rows),
                    e,
                ));
            }
            // Malformed records still occupy a row in the passes
            Err(_) => rows += 1,
        }

        if rows % ROW_COUNT_LOG_INTERVAL == 0 {
            info!("Counted {} rows so far...", rows);
        }
    }

    let elapsed = start.elapsed().as_secs_f64();
    match limit {
        Some(l) if rows >= l => info!(
            "Row limit active: processing first {} rows (counted in {:.1}s)",
            rows, elapsed
        ),
        _ => info!("Total rows: {} (counted in {:.1}s)", rows, elapsed),
    }

    Ok(rows)
}

/// Progress reporter for one pass over the input
pub struct ProgressReporter {
    progress_bar: Option<ProgressBar>,
    total_rows: Option<usize>,
}

impl ProgressReporter {
    /// Create a reporter; `total_rows` of `None` shows a spinner instead of a bar
    pub fn new(label: &str, total_rows: Option<usize>, enabled: bool) -> Self {
        if !enabled {
            return Self {
                progress_bar: None,
                total_rows,
            };
        }

        let pb = match total_rows {
            Some(total) => {
                let pb = ProgressBar::new(total as u64);
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.green} {prefix} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} rows ({percent}%) | {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("#>-"),
                );
                pb
            }
            None => {
                let pb = ProgressBar::new_spinner();
                pb.set_style(
                    ProgressStyle::default_spinner()
                        .template("{spinner:.green} {prefix} [{elapsed_precise}] {pos} rows | {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                pb
            }
        };
        pb.set_prefix(label.to_string());

        debug!("Progress bar initialized for {:?} rows", total_rows);
        Self {
            progress_bar: Some(pb),
            total_rows,
        }
    }

    /// Advance by the number of rows just processed
    pub fn increment(&self, rows: usize) {
        if let Some(ref pb) = self.progress_bar {
            pb.inc(rows as u64);
        }
    }

    pub fn set_message(&self, message: impl Into<String>) {
        if let Some(ref pb) = self.progress_bar {
            pb.set_message(message.into());
        }
    }

    /// Percentage of the counted total represented by `rows_processed`
    pub fn percent(&self, rows_processed: usize) -> Option<f64> {
        match self.total_rows {
            Some(total) if total > 0 => Some(rows_processed as f64 / total as f64 * 100.0),
            _ => None,
        }
    }

    /// Human-readable position such as `2000/4000 rows (50.0%)`
    pub fn describe(&self, rows_processed: usize) -> String {
        match (self.total_rows, self.percent(rows_processed)) {
            (Some(total), Some(pct)) => {
                format!("{}/{} rows ({:.1}%)", rows_processed, total, pct)
            }
            _ => format!("{} rows", rows_processed),
        }
    }

    pub fn finish(&self, message: impl Into<String>) {
        if let Some(ref pb) = self.progress_bar {
            pb.finish_with_message(message.into());
        }
    }

    pub fn finish_with_error(&self, error_message: &str) {
        if let Some(ref pb) = self.progress_bar {
            pb.abandon_with_message(format!("Failed: {}", error_message));
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        if let Some(ref pb) = self.progress_bar {
            if !pb.is_finished() {
                pb.finish_and_clear();
            }
        }
    }
}
