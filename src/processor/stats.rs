//! Processing statistics for both passes
//!
//! These types track how many rows each pass consumed, what it skipped and
//! why, and what it wrote, for logging and the final run report.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Statistics for Pass 1 (taxon discovery and persistence)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaxaPassStats {
    /// Input records consumed, including malformed ones
    pub rows_processed: usize,
    /// Rows classified as wildlife observations
    pub wildlife_rows: usize,
    /// Records skipped because they could not be parsed
    pub malformed_rows: usize,
    /// Chunks read from the input
    pub chunks: usize,
    /// Distinct taxon keys discovered
    pub unique_taxa: usize,
    /// Taxa newly inserted into the store
    pub taxa_inserted: usize,
    /// Taxa already present from an earlier run
    pub taxa_reused: usize,
    /// Wall time for the pass
    pub duration: Duration,
}

impl TaxaPassStats {
    /// Percentage of processed rows that were wildlife observations
    pub fn wildlife_rate(&self) -> f64 {
        if self.rows_processed == 0 {
            0.0
        } else {
            (self.wildlife_rows as f64 / self.rows_processed as f64) * 100.0
        }
    }

    /// Get a summary string of the pass
    pub fn summary(&self) -> String {
        format!(
            "{} rows processed, {} wildlife ({:.1}%), {} unique taxa ({} inserted, {} reused), {} malformed in {:.1}s",
            self.rows_processed,
            self.wildlife_rows,
            self.wildlife_rate(),
            self.unique_taxa,
            self.taxa_inserted,
            self.taxa_reused,
            self.malformed_rows,
            self.duration.as_secs_f64()
        )
    }
}

/// Statistics for Pass 2 (sequence and image batching)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SequencePassStats {
    /// Input records consumed, including malformed ones
    pub rows_processed: usize,
    /// Rows classified as wildlife observations
    pub wildlife_rows: usize,
    /// Records skipped because they could not be parsed
    pub malformed_rows: usize,
    /// Wildlife rows without a burst identifier
    pub rows_without_burst: usize,
    /// Rows whose taxon key was not in the Pass 1 map
    pub unresolved_taxon_rows: usize,
    /// Rows without an image identifier
    pub rows_without_image_id: usize,
    /// Committed flushes
    pub flushes: usize,
    /// Bursts flushed (a burst split across flushes counts once per flush)
    pub bursts_flushed: usize,
    pub sequences_created: usize,
    pub sequences_reused: usize,
    pub images_created: usize,
    /// Images skipped because their identifier already existed
    pub images_ignored: usize,
    /// Largest number of rows held in the burst buffer at a flush
    pub peak_buffered_rows: usize,
    /// Wall time for the pass
    pub duration: Duration,
}

impl SequencePassStats {
    /// Fold the results of one committed flush into the totals
    pub fn record_flush(&mut self, flush: &FlushStats) {
        self.flushes += 1;
        self.bursts_flushed += flush.bursts;
        self.unresolved_taxon_rows += flush.unresolved_taxon_rows;
        self.rows_without_image_id += flush.rows_without_image_id;
        self.sequences_created += flush.sequences_created;
        self.sequences_reused += flush.sequences_reused;
        self.images_created += flush.images_created;
        self.images_ignored += flush.images_ignored;
        self.peak_buffered_rows = self.peak_buffered_rows.max(flush.rows);
    }

    /// Rows that reached the buffer but produced no image
    pub fn rows_skipped(&self) -> usize {
        self.rows_without_burst + self.unresolved_taxon_rows + self.rows_without_image_id
    }

    /// Get a summary string of the pass
    pub fn summary(&self) -> String {
        format!(
            "{} rows processed, {} sequences created ({} reused), {} images created ({} duplicates ignored), {} flushes in {:.1}s",
            self.rows_processed,
            self.sequences_created,
            self.sequences_reused,
            self.images_created,
            self.images_ignored,
            self.flushes,
            self.duration.as_secs_f64()
        )
    }
}

/// Statistics for a single flush, merged into the pass totals after commit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub bursts: usize,
    pub rows: usize,
    pub unresolved_taxon_rows: usize,
    pub rows_without_image_id: usize,
    pub sequences_created: usize,
    pub sequences_reused: usize,
    pub images_created: usize,
    pub images_ignored: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxa_stats_summary() {
        let stats = TaxaPassStats {
            rows_processed: 1000,
            wildlife_rows: 250,
            malformed_rows: 2,
            chunks: 1,
            unique_taxa: 12,
            taxa_inserted: 10,
            taxa_reused: 2,
            duration: Duration::from_millis(1500),
        };

        assert_eq!(stats.wildlife_rate(), 25.0);
        let summary = stats.summary();
        assert!(summary.contains("1000 rows processed"));
        assert!(summary.contains("(25.0%)"));
        assert!(summary.contains("12 unique taxa (10 inserted, 2 reused)"));
        assert!(summary.contains("1.5s"));
    }

    #[test]
    fn test_empty_stats() {
        assert_eq!(TaxaPassStats::default().wildlife_rate(), 0.0);
        assert_eq!(SequencePassStats::default().rows_skipped(), 0);
    }

    #[test]
    fn test_record_flush_accumulates() {
        let mut stats = SequencePassStats::default();
        stats.rows_without_burst = 1;
        stats.record_flush(&FlushStats {
            bursts: 3,
            rows: 10,
            unresolved_taxon_rows: 1,
            rows_without_image_id: 0,
            sequences_created: 4,
            sequences_reused: 0,
            images_created: 9,
            images_ignored: 0,
        });
        stats.record_flush(&FlushStats {
            bursts: 1,
            rows: 2,
            sequences_reused: 1,
            images_ignored: 2,
            ..FlushStats::default()
        });

        assert_eq!(stats.flushes, 2);
        assert_eq!(stats.bursts_flushed, 4);
        assert_eq!(stats.sequences_created, 4);
        assert_eq!(stats.sequences_reused, 1);
        assert_eq!(stats.images_created, 9);
        assert_eq!(stats.images_ignored, 2);
        assert_eq!(stats.peak_buffered_rows, 10);
        assert_eq!(stats.rows_skipped(), 2);
    }
}
