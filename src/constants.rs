//! Application constants for the camera trap ETL
//!
//! This module contains the taxonomic rank ordering, input column names,
//! sentinel tokens, and default tuning values used throughout the pipeline.

// =============================================================================
// Taxonomic Hierarchy
// =============================================================================

/// Taxonomic ranks ordered from least specific (kingdom) to most specific (variety)
pub const TAXONOMY_RANKS: &[&str] = &[
    "kingdom",
    "phylum",
    "subphylum",
    "superclass",
    "class",
    "subclass",
    "infraclass",
    "superorder",
    "order",
    "suborder",
    "infraorder",
    "superfamily",
    "family",
    "subfamily",
    "tribe",
    "genus",
    "subgenus",
    "species",
    "subspecies",
    "variety",
];

/// Number of hierarchy ranks in a taxon key
pub const RANK_COUNT: usize = 20;

/// Number of fields in a composite taxon key (hierarchy plus common name)
pub const TAXON_KEY_LEN: usize = RANK_COUNT + 1;

// =============================================================================
// Input Columns
// =============================================================================

pub mod columns {
    pub const COMMON_NAME: &str = "common_name";
    pub const SEQUENCE_ID: &str = "sequence_id";
    pub const LOCATION_ID: &str = "location_id";
    pub const DATETIME: &str = "datetime";
    pub const IMAGE_ID: &str = "image_id";
    pub const FRAME_NUM: &str = "frame_num";
    pub const URL_GCP: &str = "url_gcp";
    pub const URL_AWS: &str = "url_aws";
    pub const URL_AZURE: &str = "url_azure";
}

// =============================================================================
// Value Normalization
// =============================================================================

/// Tokens (compared case-insensitively) that mark a field as absent
pub const ABSENT_TOKENS: &[&str] = &["", "nan", "none", "null"];

/// Common name uses a broader exclusion list than every other field
pub const COMMON_NAME_ABSENT_TOKENS: &[&str] = &["", "nan", "none", "null", "empty"];

// =============================================================================
// Database
// =============================================================================

/// Database file name used by every candidate location
pub const DATABASE_FILE_NAME: &str = "camera_trap_data.db";

/// Environment variable that overrides database discovery
pub const DATABASE_PATH_ENV: &str = "DATABASE_PATH";

/// Candidate database locations, checked in order
pub const DATABASE_CANDIDATES: &[&str] = &[
    "/app/data/camera_trap_data.db",
    "data/camera_trap_data.db",
    "camera_trap_data.db",
];

/// Application directory under the user data directory
pub const DATA_DIR_APP_NAME: &str = "camera-trap";

/// Tables the pipeline writes to
pub const TAXA_TABLE: &str = "taxa";
pub const SEQUENCES_TABLE: &str = "sequences";
pub const IMAGES_TABLE: &str = "images";

/// Database column for each rank; `order` is a reserved word in SQL
pub const TAXA_RANK_COLUMNS: &[&str] = &[
    "kingdom",
    "phylum",
    "subphylum",
    "superclass",
    "class",
    "subclass",
    "infraclass",
    "superorder",
    "order_",
    "suborder",
    "infraorder",
    "superfamily",
    "family",
    "subfamily",
    "tribe",
    "genus",
    "subgenus",
    "species",
    "subspecies",
    "variety",
];

pub const SEQUENCES_COLUMNS: &[&str] = &["id", "sequence_id", "taxon_id", "location_id", "datetime"];

pub const IMAGES_COLUMNS: &[&str] = &[
    "id",
    "image_id",
    "sequence_table_id",
    "frame_num",
    "url_gcp",
    "url_aws",
    "url_azure",
];

// =============================================================================
// Processing Defaults
// =============================================================================

/// Rows read per chunk in both passes
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Distinct buffered bursts that trigger a Pass 2 flush
pub const DEFAULT_FLUSH_THRESHOLD: usize = 5000;

/// Taxa inserted per transaction in Pass 1
pub const DEFAULT_TAXA_COMMIT_INTERVAL: usize = 500;

/// Row cap applied in debug mode
pub const DEFAULT_DEBUG_ROWS: usize = 100_000;

/// System memory usage fraction above which flushes log a warning
pub const DEFAULT_MEMORY_WARNING_THRESHOLD: f64 = 0.8;

/// Row counting logs progress at this interval
pub const ROW_COUNT_LOG_INTERVAL: usize = 1_000_000;

/// Number of taxa sampled in the final report
pub const SUMMARY_SAMPLE_SIZE: usize = 5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_tables_align() {
        assert_eq!(TAXONOMY_RANKS.len(), RANK_COUNT);
        assert_eq!(TAXA_RANK_COLUMNS.len(), RANK_COUNT);
        for (rank, column) in TAXONOMY_RANKS.iter().zip(TAXA_RANK_COLUMNS) {
            if *rank == "order" {
                assert_eq!(*column, "order_");
            } else {
                assert_eq!(rank, column);
            }
        }
    }

    #[test]
    fn test_common_name_tokens_are_superset() {
        for token in ABSENT_TOKENS {
            assert!(COMMON_NAME_ABSENT_TOKENS.contains(token));
        }
        assert!(COMMON_NAME_ABSENT_TOKENS.contains(&"empty"));
        assert!(!ABSENT_TOKENS.contains(&"empty"));
    }
}
