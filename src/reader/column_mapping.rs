//! Column mapping for camera trap CSV exports
//!
//! Resolves the header once so each record can be turned into an
//! [`ObservationRow`] by index. Columns the pipeline does not read are
//! ignored; columns it reads but the file lacks are reported and read as
//! empty values.

use crate::constants::{RANK_COUNT, TAXONOMY_RANKS, columns};
use crate::models::ObservationRow;
use csv::StringRecord;
use std::collections::HashMap;

/// Header-derived column positions
#[derive(Debug, Clone)]
pub struct ColumnMapping {
    /// Column name to index mapping for every header column
    pub name_to_index: HashMap<String, usize>,

    rank_indices: [Option<usize>; RANK_COUNT],
    common_name: Option<usize>,
    sequence_id: Option<usize>,
    location_id: Option<usize>,
    datetime: Option<usize>,
    image_id: Option<usize>,
    frame_num: Option<usize>,
    url_gcp: Option<usize>,
    url_aws: Option<usize>,
    url_azure: Option<usize>,
}

impl ColumnMapping {
    /// Analyze column headers
    pub fn analyze(headers: &StringRecord) -> Self {
        let mut name_to_index = HashMap::new();
        for (index, header) in headers.iter().enumerate() {
            let column_name = header.trim_start_matches('\u{feff}').trim().to_string();
            // First occurrence wins for duplicated header names
            name_to_index.entry(column_name).or_insert(index);
        }

        let lookup = |name: &str| name_to_index.get(name).copied();

        Self {
            rank_indices: std::array::from_fn(|i| lookup(TAXONOMY_RANKS[i])),
            common_name: lookup(columns::COMMON_NAME),
            sequence_id: lookup(columns::SEQUENCE_ID),
            location_id: lookup(columns::LOCATION_ID),
            datetime: lookup(columns::DATETIME),
            image_id: lookup(columns::IMAGE_ID),
            frame_num: lookup(columns::FRAME_NUM),
            url_gcp: lookup(columns::URL_GCP),
            url_aws: lookup(columns::URL_AWS),
            url_azure: lookup(columns::URL_AZURE),
            name_to_index,
        }
    }

    /// Check if a column exists in the mapping
    pub fn has_column(&self, column_name: &str) -> bool {
        self.name_to_index.contains_key(column_name)
    }

    /// Columns the pipeline reads that the header does not contain
    pub fn missing_columns(&self) -> Vec<&'static str> {
        let metadata = [
            columns::COMMON_NAME,
            columns::SEQUENCE_ID,
            columns::LOCATION_ID,
            columns::DATETIME,
            columns::IMAGE_ID,
            columns::FRAME_NUM,
            columns::URL_GCP,
            columns::URL_AWS,
            columns::URL_AZURE,
        ];

        TAXONOMY_RANKS
            .iter()
            .chain(metadata.iter())
            .copied()
            .filter(|name| !self.has_column(name))
            .collect()
    }

    /// True if at least one column able to identify a taxon is present
    pub fn has_taxonomy(&self) -> bool {
        self.common_name.is_some() || self.rank_indices.iter().any(Option::is_some)
    }

    /// Build an observation row from a record
    pub fn build_row(&self, record: &StringRecord, record_number: u64) -> ObservationRow {
        let field = |index: Option<usize>| -> String {
            index
                .and_then(|i| record.get(i))
                .unwrap_or_default()
                .to_string()
        };

        ObservationRow {
            record_number,
            ranks: std::array::from_fn(|i| field(self.rank_indices[i])),
            common_name: field(self.common_name),
            sequence_id: field(self.sequence_id),
            location_id: field(self.location_id),
            datetime: field(self.datetime),
            image_id: field(self.image_id),
            frame_num: field(self.frame_num),
            url_gcp: field(self.url_gcp),
            url_aws: field(self.url_aws),
            url_azure: field(self.url_azure),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_maps_known_columns() {
        let headers = StringRecord::from(vec![
            "\u{feff}sequence_id",
            " species ",
            "common_name",
            "image_id",
            "frame_num",
            "extra",
        ]);
        let mapping = ColumnMapping::analyze(&headers);

        assert_eq!(mapping.name_to_index.get("sequence_id"), Some(&0));
        assert_eq!(mapping.name_to_index.get("species"), Some(&1));
        assert!(mapping.has_column("extra"));
        assert!(mapping.has_taxonomy());

        let missing = mapping.missing_columns();
        assert!(missing.contains(&"kingdom"));
        assert!(missing.contains(&"url_azure"));
        assert!(!missing.contains(&"species"));
        assert!(!missing.contains(&"image_id"));
    }

    #[test]
    fn test_build_row_tolerates_short_records() {
        let headers = StringRecord::from(vec!["sequence_id", "species", "common_name", "image_id"]);
        let mapping = ColumnMapping::analyze(&headers);

        let record = StringRecord::from(vec!["1001", "Canis latrans"]);
        let row = mapping.build_row(&record, 4);

        assert_eq!(row.record_number, 4);
        assert_eq!(row.sequence_id, "1001");
        assert_eq!(row.rank("species"), Some("Canis latrans"));
        assert_eq!(row.common_name, "");
        assert_eq!(row.image_id, "");
        assert_eq!(row.location_id, "");
    }

    #[test]
    fn test_has_taxonomy_false_without_taxonomic_columns() {
        let headers = StringRecord::from(vec!["sequence_id", "image_id"]);
        let mapping = ColumnMapping::analyze(&headers);
        assert!(!mapping.has_taxonomy());
    }
}
