//! Camera Trap ETL Library
//!
//! Loads wildlife camera-trap observation exports from CSV into a
//! pre-existing SQLite schema of taxa, sequences and images.
//!
//! This library provides tools for:
//! - Classifying rows as wildlife observations and building taxon keys
//! - Streaming large CSV inputs in fixed-size chunks
//! - Discovering and persisting unique taxa (Pass 1)
//! - Grouping bursts into per-taxon sequences with frame-ordered images (Pass 2)
//! - Idempotent reruns against a partially loaded database

pub mod classifier;
pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod processor;
pub mod reader;
pub mod store;

// Re-export commonly used types
pub use config::PipelineConfig;
pub use error::{EtlError, Result};
pub use models::{ObservationRow, Taxon, TaxonKey};
pub use processor::{Pipeline, PipelineSummary};
pub use store::Store;
