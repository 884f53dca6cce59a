//! Command-line argument definitions for the camera trap ETL
//!
//! Defines the CLI interface using the clap derive API and maps it onto a
//! [`PipelineConfig`].

use crate::config::PipelineConfig;
use crate::constants::{DEFAULT_CHUNK_SIZE, DEFAULT_DEBUG_ROWS, DEFAULT_FLUSH_THRESHOLD};
use clap::Parser;
use std::path::{Path, PathBuf};

/// Load wildlife camera-trap observations from CSV into SQLite
///
/// Runs two passes over the input: the first collects and stores every
/// distinct taxon, the second groups rows into sequences per burst and taxon
/// and stores their images in frame order.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "camera-trap-etl",
    version,
    about = "Load camera-trap observation CSV into a normalized SQLite database",
    long_about = "Streams a camera-trap observation export twice. Pass 1 extracts every distinct \
                  taxon and stores it; Pass 2 groups rows by burst and taxon into sequences and \
                  stores their images in frame order. The database schema must already exist."
)]
pub struct Args {
    /// Path to the observation CSV file
    #[arg(long = "csv-path", value_name = "PATH")]
    pub csv_path: PathBuf,

    /// Process only the first rows of the input
    ///
    /// Both passes stop after `--debug-rows` records, so a trial run sees a
    /// consistent prefix of the file.
    #[arg(long = "debug", help = "Process only the first --debug-rows rows")]
    pub debug: bool,

    /// Row cap used by --debug
    #[arg(
        long = "debug-rows",
        value_name = "COUNT",
        default_value_t = DEFAULT_DEBUG_ROWS
    )]
    pub debug_rows: usize,

    /// SQLite database to load into
    ///
    /// If not specified, uses DATABASE_PATH from the environment, then the
    /// first existing default location.
    #[arg(long = "database", value_name = "PATH")]
    pub database: Option<PathBuf>,

    /// Rows read per chunk
    #[arg(
        long = "chunk-size",
        value_name = "ROWS",
        default_value_t = DEFAULT_CHUNK_SIZE
    )]
    pub chunk_size: usize,

    /// Distinct bursts buffered before Pass 2 writes a batch
    #[arg(
        long = "flush-threshold",
        value_name = "BURSTS",
        default_value_t = DEFAULT_FLUSH_THRESHOLD
    )]
    pub flush_threshold: usize,

    /// Logging verbosity level
    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        help = "Increase logging verbosity (-v: info, -vv: debug, -vvv: trace)"
    )]
    pub verbose: u8,

    /// Suppress output (quiet mode)
    ///
    /// Only show errors. Overrides verbose settings and hides progress bars.
    #[arg(
        short = 'q',
        long = "quiet",
        help = "Suppress output except errors",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,
}

impl Args {
    /// Get the effective log level based on verbose and quiet flags
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            }
        }
    }

    /// Row cap for both passes, set only in debug mode
    pub fn row_limit(&self) -> Option<usize> {
        self.debug.then_some(self.debug_rows)
    }

    /// Check if progress bars should be shown
    pub fn show_progress(&self) -> bool {
        !self.quiet
    }

    /// Build the pipeline configuration for a resolved database path
    pub fn to_config(&self, database_path: &Path) -> PipelineConfig {
        PipelineConfig::new(&self.csv_path, database_path)
            .with_chunk_size(self.chunk_size)
            .with_flush_threshold(self.flush_threshold)
            .with_row_limit(self.row_limit())
            .with_progress(self.show_progress())
    }
}
