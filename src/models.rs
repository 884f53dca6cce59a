//! Core data structures for camera trap processing.
//!
//! Defines the raw observation row read from the input, the composite taxon
//! key, and the taxon record persisted by the first pass.

use crate::constants::{RANK_COUNT, TAXON_KEY_LEN, TAXONOMY_RANKS};
use serde::{Deserialize, Serialize};

/// One raw input row, restricted to the columns the pipeline reads
///
/// Values are kept exactly as read (untrimmed); a column missing from the
/// input or a short record yields an empty string. Normalization happens in
/// [`crate::classifier`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservationRow {
    /// 1-based data record number (header excluded)
    pub record_number: u64,
    /// Hierarchy values in [`TAXONOMY_RANKS`] order
    pub ranks: [String; RANK_COUNT],
    pub common_name: String,
    pub sequence_id: String,
    pub location_id: String,
    pub datetime: String,
    pub image_id: String,
    pub frame_num: String,
    pub url_gcp: String,
    pub url_aws: String,
    pub url_azure: String,
}

impl ObservationRow {
    /// Create an empty row for the given record number
    pub fn new(record_number: u64) -> Self {
        Self {
            record_number,
            ..Self::default()
        }
    }

    /// Raw value for a rank name, if the name is a known rank
    pub fn rank(&self, rank: &str) -> Option<&str> {
        TAXONOMY_RANKS
            .iter()
            .position(|r| *r == rank)
            .map(|index| self.ranks[index].as_str())
    }

    /// Set a rank value by name; unknown rank names are ignored
    pub fn set_rank(&mut self, rank: &str, value: impl Into<String>) {
        if let Some(index) = TAXONOMY_RANKS.iter().position(|r| *r == rank) {
            self.ranks[index] = value.into();
        }
    }
}

/// Composite biological identity of a taxon
///
/// The hierarchy values in rank order followed by the common name, with
/// absent values represented as the empty string. Matching is exact-string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaxonKey([String; TAXON_KEY_LEN]);

impl TaxonKey {
    pub fn new(fields: [String; TAXON_KEY_LEN]) -> Self {
        Self(fields)
    }

    pub fn fields(&self) -> &[String] {
        &self.0
    }

    pub fn common_name(&self) -> &str {
        &self.0[RANK_COUNT]
    }
}

/// A deduplicated taxon as persisted in the `taxa` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taxon {
    /// Normalized hierarchy values in [`TAXONOMY_RANKS`] order
    pub ranks: [Option<String>; RANK_COUNT],
    pub common_name: Option<String>,
    pub most_specific_level: Option<String>,
    pub most_specific_name: Option<String>,
}

impl Taxon {
    /// Composite key of this taxon
    pub fn key(&self) -> TaxonKey {
        TaxonKey::new(std::array::from_fn(|index| {
            if index < RANK_COUNT {
                self.ranks[index].clone().unwrap_or_default()
            } else {
                self.common_name.clone().unwrap_or_default()
            }
        }))
    }

    /// Normalized value for a rank name
    pub fn rank(&self, rank: &str) -> Option<&str> {
        TAXONOMY_RANKS
            .iter()
            .position(|r| *r == rank)
            .and_then(|index| self.ranks[index].as_deref())
    }

    /// Display label used in reports: most specific name, else common name
    pub fn label(&self) -> &str {
        self.most_specific_name
            .as_deref()
            .or(self.common_name.as_deref())
            .unwrap_or("<unnamed>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_rank_accessors() {
        let mut row = ObservationRow::new(7);
        row.set_rank("genus", "Vulpes");
        row.set_rank("not_a_rank", "ignored");

        assert_eq!(row.record_number, 7);
        assert_eq!(row.rank("genus"), Some("Vulpes"));
        assert_eq!(row.rank("species"), Some(""));
        assert_eq!(row.rank("not_a_rank"), None);
    }

    #[test]
    fn test_taxon_key_uses_empty_for_absent() {
        let mut ranks: [Option<String>; RANK_COUNT] = Default::default();
        ranks[17] = Some("Vulpes vulpes".to_string());
        let taxon = Taxon {
            ranks,
            common_name: None,
            most_specific_level: Some("species".to_string()),
            most_specific_name: Some("Vulpes vulpes".to_string()),
        };

        let key = taxon.key();
        assert_eq!(key.fields().len(), TAXON_KEY_LEN);
        assert_eq!(key.fields()[17], "Vulpes vulpes");
        assert_eq!(key.common_name(), "");
        assert!(key.fields()[..17].iter().all(String::is_empty));
        assert_eq!(taxon.rank("species"), Some("Vulpes vulpes"));
        assert_eq!(taxon.label(), "Vulpes vulpes");
    }
}
