//! Error handling for camera trap ETL operations.
//!
//! Provides error types with context for pre-flight checks, input reading,
//! and storage failures in either pass.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline stage an input or storage failure occurred in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    TaxaScan,
    TaxaInsertion,
    SequenceScan,
    SequenceFlush,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::TaxaScan => write!(f, "pass 1 (taxa scan)"),
            Stage::TaxaInsertion => write!(f, "pass 1 (taxa insertion)"),
            Stage::SequenceScan => write!(f, "pass 2 (sequence scan)"),
            Stage::SequenceFlush => write!(f, "pass 2 (sequence/image flush)"),
        }
    }
}

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Input file not found: {path}")]
    InputNotFound { path: PathBuf },

    #[error("Database not found: {path} (create the schema before loading data)")]
    DatabaseNotFound { path: PathBuf },

    #[error("Failed to read input {path}: {message}")]
    Input {
        path: PathBuf,
        message: String,
        #[source]
        source: csv::Error,
    },

    #[error("Database schema incomplete: {details}")]
    SchemaMissing { details: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage failure during {stage} after {rows_processed} rows")]
    Storage {
        stage: Stage,
        rows_processed: usize,
        #[source]
        source: rusqlite::Error,
    },

    #[error("No taxa found after scanning {rows_processed} rows; check the CSV format and data")]
    EmptyResult { rows_processed: usize },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl EtlError {
    /// Create an I/O error with context
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create an input reading error
    pub fn input(path: impl Into<PathBuf>, message: impl Into<String>, source: csv::Error) -> Self {
        Self::Input {
            path: path.into(),
            message: message.into(),
            source,
        }
    }

    /// Create a schema verification error
    pub fn schema_missing(details: impl Into<String>) -> Self {
        Self::SchemaMissing {
            details: details.into(),
        }
    }

    /// Create a storage error tagged with the stage and progress reached
    pub fn storage(stage: Stage, rows_processed: usize, source: rusqlite::Error) -> Self {
        Self::Storage {
            stage,
            rows_processed,
            source,
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Whether this error was raised before any pass started
    pub fn is_pre_flight(&self) -> bool {
        matches!(
            self,
            Self::InputNotFound { .. } | Self::DatabaseNotFound { .. } | Self::SchemaMissing { .. }
        )
    }
}

impl From<std::io::Error> for EtlError {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: "I/O operation failed".to_string(),
            source: error,
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
