//! Two-pass ETL pipeline.
//!
//! Orchestrates pre-flight checks, the taxon discovery pass, the sequence
//! and image batching pass, and the final database summary.

pub mod progress;
pub mod report;
pub mod sequences;
pub mod stats;
pub mod taxa;

#[cfg(test)]
pub mod tests;

use self::progress::count_rows;
use self::sequences::run_sequence_pass;
use self::stats::{SequencePassStats, TaxaPassStats};
use self::taxa::run_taxa_pass;

use crate::config::PipelineConfig;
use crate::constants::SUMMARY_SAMPLE_SIZE;
use crate::error::{EtlError, Result};
use crate::models::Taxon;
use crate::store::{Store, TableCounts};

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// State of the database after a run
#[derive(Debug, Clone)]
pub struct DatabaseSummary {
    pub counts: TableCounts,
    /// Database file size, when the store lives on disk
    pub size_bytes: Option<u64>,
    /// Random sample of named taxa
    pub sample_taxa: Vec<Taxon>,
}

/// Everything a completed run reports
#[derive(Debug, Clone)]
pub struct PipelineSummary {
    pub input_path: PathBuf,
    pub database_path: PathBuf,
    pub row_limit: Option<usize>,
    /// Pre-counted input rows, if counting succeeded
    pub total_rows: Option<usize>,
    pub taxa: TaxaPassStats,
    pub sequences: SequencePassStats,
    /// `None` when the summary queries failed; the load itself succeeded
    pub database: Option<DatabaseSummary>,
    pub duration: Duration,
}

/// Runs both passes against one input file and one database
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a pipeline, validating the configuration
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run pre-flight checks and both passes
    ///
    /// Pass 2 starts only after Pass 1 has persisted every taxon. Any
    /// failure aborts the run; flushes committed before the failure remain.
    pub fn run(&self) -> Result<PipelineSummary> {
        let start = Instant::now();
        let mut store = self.pre_flight()?;
        self.run_with_store(&mut store, start)
    }

    /// Run both passes against an already-open store
    pub fn run_with_store(&self, store: &mut Store, start: Instant) -> Result<PipelineSummary> {
        let config = &self.config;
        if !config.input_path.exists() {
            return Err(EtlError::InputNotFound {
                path: config.input_path.clone(),
            });
        }

        let total_rows = match count_rows(&config.input_path, config.row_limit) {
            Ok(rows) => Some(rows),
            Err(e) => {
                warn!("Row count failed, progress will show absolute counts: {}", e);
                None
            }
        };

        let (taxon_ids, taxa) = run_taxa_pass(config, store, total_rows)?;
        let sequences = run_sequence_pass(config, store, &taxon_ids, total_rows)?;

        let database = match summarize_database(store) {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!("Could not summarize database contents: {}", e);
                None
            }
        };

        let duration = start.elapsed();
        info!("ETL complete in {:.1}s", duration.as_secs_f64());

        Ok(PipelineSummary {
            input_path: config.input_path.clone(),
            database_path: config.database_path.clone(),
            row_limit: config.row_limit,
            total_rows,
            taxa,
            sequences,
            database,
            duration,
        })
    }

    /// Check the input exists and open the database with a verified schema
    fn pre_flight(&self) -> Result<Store> {
        let config = &self.config;
        let metadata = fs::metadata(&config.input_path).map_err(|_| EtlError::InputNotFound {
            path: config.input_path.clone(),
        })?;
        if !metadata.is_file() {
            return Err(EtlError::InputNotFound {
                path: config.input_path.clone(),
            });
        }
        info!(
            "Input file {} ({:.1} MB)",
            config.input_path.display(),
            metadata.len() as f64 / (1024.0 * 1024.0)
        );

        let store = Store::open(&config.database_path)?;
        info!("Database schema verified");

        if let Some(limit) = config.row_limit {
            info!("Row limit active: each pass reads at most {} rows", limit);
        }
        Ok(store)
    }
}

fn summarize_database(store: &Store) -> Result<DatabaseSummary> {
    let counts = store.table_counts()?;
    let sample_taxa = store.sample_taxa(SUMMARY_SAMPLE_SIZE)?;
    let size_bytes = store
        .path()
        .and_then(|path| fs::metadata(path).ok())
        .map(|metadata| metadata.len());

    info!(
        "Database now holds {} taxa, {} sequences, {} images",
        counts.taxa, counts.sequences, counts.images
    );
    Ok(DatabaseSummary {
        counts,
        size_bytes,
        sample_taxa,
    })
}
