//! Pre-flight verification of the destination schema
//!
//! The schema is created by a separate bootstrap step. Before either pass
//! runs, the pipeline checks that every table and column it writes exists
//! and that the uniqueness constraints its idempotent inserts rely on are
//! in place.

use crate::constants::{
    IMAGES_COLUMNS, IMAGES_TABLE, SEQUENCES_COLUMNS, SEQUENCES_TABLE, TAXA_RANK_COLUMNS,
    TAXA_TABLE,
};
use crate::error::{EtlError, Result};
use rusqlite::Connection;
use std::collections::BTreeSet;
use tracing::debug;

/// Columns required on the `taxa` table
pub fn taxa_columns() -> Vec<&'static str> {
    let mut columns = vec!["id"];
    columns.extend_from_slice(TAXA_RANK_COLUMNS);
    columns.extend_from_slice(&["common_name", "most_specific_level", "most_specific_name"]);
    columns
}

/// Verify all tables, columns and uniqueness constraints the pipeline needs
pub fn verify_schema(conn: &Connection) -> Result<()> {
    let mut problems = Vec::new();

    let required: [(&str, Vec<&str>); 3] = [
        (TAXA_TABLE, taxa_columns()),
        (SEQUENCES_TABLE, SEQUENCES_COLUMNS.to_vec()),
        (IMAGES_TABLE, IMAGES_COLUMNS.to_vec()),
    ];

    for (table, columns) in &required {
        let existing = table_columns(conn, table)?;
        if existing.is_empty() {
            problems.push(format!("missing table '{}'", table));
            continue;
        }

        let missing: Vec<&str> = columns
            .iter()
            .copied()
            .filter(|c| !existing.contains(*c))
            .collect();
        if !missing.is_empty() {
            problems.push(format!(
                "table '{}' missing columns: {}",
                table,
                missing.join(", ")
            ));
        }
    }

    if problems.is_empty() {
        let constraints = [
            (SEQUENCES_TABLE, &["sequence_id", "taxon_id"][..]),
            (IMAGES_TABLE, &["image_id"][..]),
        ];
        for (table, columns) in constraints {
            if !has_unique_constraint(conn, table, columns)? {
                problems.push(format!(
                    "table '{}' lacks a UNIQUE constraint on ({})",
                    table,
                    columns.join(", ")
                ));
            }
        }
    }

    if problems.is_empty() {
        debug!("Destination schema verified");
        Ok(())
    } else {
        Err(EtlError::schema_missing(problems.join("; ")))
    }
}

/// Column names of a table; empty if the table does not exist
fn table_columns(conn: &Connection, table: &str) -> Result<BTreeSet<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info(\"{}\")", table))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<std::result::Result<BTreeSet<_>, _>>()?;
    Ok(columns)
}

/// Whether some unique index covers exactly the given columns
fn has_unique_constraint(conn: &Connection, table: &str, columns: &[&str]) -> Result<bool> {
    let wanted: BTreeSet<&str> = columns.iter().copied().collect();

    let mut stmt = conn.prepare(&format!("PRAGMA index_list(\"{}\")", table))?;
    let unique_indexes = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(1)?, row.get::<_, i64>(2)? != 0))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    for (index_name, unique) in unique_indexes {
        if !unique {
            continue;
        }
        let mut info = conn.prepare(&format!("PRAGMA index_info(\"{}\")", index_name))?;
        let indexed = info
            .query_map([], |row| row.get::<_, Option<String>>(2))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let indexed: BTreeSet<&str> = indexed.iter().flatten().map(String::as_str).collect();
        if indexed == wanted {
            return Ok(true);
        }
    }

    Ok(false)
}

/// DDL matching the bootstrap schema, used to set up test databases
#[cfg(test)]
pub(crate) fn create_test_schema(conn: &Connection) {
    let ranks = TAXA_RANK_COLUMNS
        .iter()
        .map(|c| format!("{} TEXT", c))
        .collect::<Vec<_>>()
        .join(",\n");
    let ddl = format!(
        "CREATE TABLE taxa (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            {ranks},
            common_name TEXT,
            most_specific_level TEXT,
            most_specific_name TEXT
        );
        CREATE TABLE sequences (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sequence_id TEXT,
            taxon_id INTEGER,
            location_id TEXT,
            datetime TEXT,
            FOREIGN KEY (taxon_id) REFERENCES taxa (id),
            UNIQUE(sequence_id, taxon_id)
        );
        CREATE TABLE images (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            image_id TEXT UNIQUE,
            sequence_table_id INTEGER,
            frame_num INTEGER,
            url_gcp TEXT,
            url_aws TEXT,
            url_azure TEXT,
            FOREIGN KEY (sequence_table_id) REFERENCES sequences (id)
        );
        CREATE INDEX idx_sequences_taxon ON sequences(taxon_id);
        CREATE INDEX idx_images_sequence ON images(sequence_table_id);"
    );
    conn.execute_batch(&ddl).unwrap();
}
