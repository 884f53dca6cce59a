//! Configuration management and validation.
//!
//! Provides the pipeline configuration with chunking and flushing knobs, and
//! the one-shot resolution of the database location from CLI, environment,
//! and candidate paths.

use crate::constants::{
    DATA_DIR_APP_NAME, DATABASE_CANDIDATES, DATABASE_FILE_NAME, DEFAULT_CHUNK_SIZE,
    DEFAULT_FLUSH_THRESHOLD, DEFAULT_MEMORY_WARNING_THRESHOLD, DEFAULT_TAXA_COMMIT_INTERVAL,
};
use crate::error::{EtlError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration for a full pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Input CSV file
    pub input_path: PathBuf,

    /// Destination SQLite database (schema must already exist)
    pub database_path: PathBuf,

    /// Rows read per chunk in both passes
    pub chunk_size: usize,

    /// Distinct buffered bursts that trigger a Pass 2 flush
    ///
    /// This bounds memory only when a burst's rows are close together in the
    /// input. Scattered bursts keep their rows buffered until the next flush.
    pub flush_threshold: usize,

    /// Taxa inserted per transaction in Pass 1
    pub taxa_commit_interval: usize,

    /// Optional cap on input records consumed by each pass
    pub row_limit: Option<usize>,

    /// Show progress bars
    pub show_progress: bool,

    /// System memory usage fraction above which flushes log a warning
    pub memory_warning_threshold: f64,
}

impl PipelineConfig {
    pub fn new(input_path: impl Into<PathBuf>, database_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            database_path: database_path.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            taxa_commit_interval: DEFAULT_TAXA_COMMIT_INTERVAL,
            row_limit: None,
            show_progress: true,
            memory_warning_threshold: DEFAULT_MEMORY_WARNING_THRESHOLD,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_flush_threshold(mut self, flush_threshold: usize) -> Self {
        self.flush_threshold = flush_threshold;
        self
    }

    pub fn with_taxa_commit_interval(mut self, interval: usize) -> Self {
        self.taxa_commit_interval = interval;
        self
    }

    /// Limit both passes to the first `rows` input records
    pub fn with_row_limit(mut self, rows: Option<usize>) -> Self {
        self.row_limit = rows;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(EtlError::configuration("chunk size must be at least 1"));
        }
        if self.flush_threshold == 0 {
            return Err(EtlError::configuration("flush threshold must be at least 1"));
        }
        if self.taxa_commit_interval == 0 {
            return Err(EtlError::configuration(
                "taxa commit interval must be at least 1",
            ));
        }
        if self.row_limit == Some(0) {
            return Err(EtlError::configuration("row limit must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.memory_warning_threshold) {
            return Err(EtlError::configuration(
                "memory warning threshold must be between 0 and 1",
            ));
        }
        Ok(())
    }
}

/// Where the database path came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseSource {
    Argument,
    Environment,
    Candidate,
    Default,
}

impl fmt::Display for DatabaseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseSource::Argument => write!(f, "command line"),
            DatabaseSource::Environment => write!(f, "environment"),
            DatabaseSource::Candidate => write!(f, "auto-detected"),
            DatabaseSource::Default => write!(f, "default (not found)"),
        }
    }
}

/// A resolved database location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDatabase {
    pub path: PathBuf,
    pub source: DatabaseSource,
}

/// Candidate database locations in priority order
pub fn database_candidates() -> Vec<PathBuf> {
    let mut candidates: Vec<PathBuf> = DATABASE_CANDIDATES.iter().map(PathBuf::from).collect();
    if let Some(data_dir) = dirs::data_dir() {
        candidates.push(data_dir.join(DATA_DIR_APP_NAME).join(DATABASE_FILE_NAME));
    }
    candidates
}

/// Resolve the database location once at startup
///
/// Order: explicit argument, environment value, first existing candidate,
/// and finally the first candidate as a default that pre-flight will report
/// as missing.
pub fn resolve_database_path(
    argument: Option<&Path>,
    environment: Option<&str>,
    candidates: &[PathBuf],
) -> ResolvedDatabase {
    if let Some(path) = argument {
        return ResolvedDatabase {
            path: path.to_path_buf(),
            source: DatabaseSource::Argument,
        };
    }

    if let Some(value) = environment.map(str::trim).filter(|v| !v.is_empty()) {
        return ResolvedDatabase {
            path: PathBuf::from(value),
            source: DatabaseSource::Environment,
        };
    }

    for candidate in candidates {
        debug!("Checking database candidate {}", candidate.display());
        if candidate.exists() {
            return ResolvedDatabase {
                path: candidate.clone(),
                source: DatabaseSource::Candidate,
            };
        }
    }

    ResolvedDatabase {
        path: candidates
            .first()
            .cloned()
            .unwrap_or_else(|| PathBuf::from(DATABASE_FILE_NAME)),
        source: DatabaseSource::Default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::new("in.csv", "out.db");
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.flush_threshold, DEFAULT_FLUSH_THRESHOLD);
        assert!(config.row_limit.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let base = PipelineConfig::new("in.csv", "out.db");
        assert!(base.clone().with_chunk_size(0).validate().is_err());
        assert!(base.clone().with_flush_threshold(0).validate().is_err());
        assert!(base.clone().with_taxa_commit_interval(0).validate().is_err());
        assert!(base.clone().with_row_limit(Some(0)).validate().is_err());
        assert!(base.with_row_limit(Some(10)).validate().is_ok());
    }

    #[test]
    fn test_argument_wins() {
        let resolved = resolve_database_path(
            Some(Path::new("explicit.db")),
            Some("env.db"),
            &[PathBuf::from("candidate.db")],
        );
        assert_eq!(resolved.path, PathBuf::from("explicit.db"));
        assert_eq!(resolved.source, DatabaseSource::Argument);
    }

    #[test]
    fn test_environment_before_candidates() {
        let resolved = resolve_database_path(None, Some(" env.db "), &[]);
        assert_eq!(resolved.path, PathBuf::from("env.db"));
        assert_eq!(resolved.source, DatabaseSource::Environment);

        let blank = resolve_database_path(None, Some("  "), &[PathBuf::from("a.db")]);
        assert_eq!(blank.source, DatabaseSource::Default);
    }

    #[test]
    fn test_first_existing_candidate() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.db");
        let present = dir.path().join("present.db");
        let later = dir.path().join("later.db");
        std::fs::write(&present, b"").unwrap();
        std::fs::write(&later, b"").unwrap();

        let resolved = resolve_database_path(None, None, &[missing, present.clone(), later]);
        assert_eq!(resolved.path, present);
        assert_eq!(resolved.source, DatabaseSource::Candidate);
    }

    #[test]
    fn test_default_when_nothing_exists() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("first.db");
        let resolved = resolve_database_path(None, None, &[first.clone(), dir.path().join("b.db")]);
        assert_eq!(resolved.path, first);
        assert_eq!(resolved.source, DatabaseSource::Default);
    }

    #[test]
    fn test_candidates_start_with_container_path() {
        let candidates = database_candidates();
        assert_eq!(candidates[0], PathBuf::from("/app/data/camera_trap_data.db"));
        assert!(candidates.len() >= DATABASE_CANDIDATES.len());
    }
}
