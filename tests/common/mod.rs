//! Shared fixtures for integration tests

#![allow(dead_code)]

use camera_trap_etl::constants::TAXONOMY_RANKS;
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};

pub const HEADER: &str = "kingdom,phylum,class,order,family,genus,species,subspecies,common_name,sequence_id,location_id,datetime,image_id,frame_num,url_gcp,url_aws,url_azure";

/// Create a database file with the bootstrap schema
pub fn create_database(path: &Path) {
    let ranks = TAXONOMY_RANKS
        .iter()
        .map(|rank| {
            if *rank == "order" {
                "order_ TEXT".to_string()
            } else {
                format!("{} TEXT", rank)
            }
        })
        .collect::<Vec<_>>()
        .join(", ");

    let conn = Connection::open(path).unwrap();
    conn.execute_batch(&format!(
        "CREATE TABLE taxa (
            id INTEGER PRIMARY KEY AUTOINCREMENT, {ranks},
            common_name TEXT, most_specific_level TEXT, most_specific_name TEXT
        );
        CREATE TABLE sequences (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sequence_id TEXT, taxon_id INTEGER, location_id TEXT, datetime TEXT,
            FOREIGN KEY (taxon_id) REFERENCES taxa (id),
            UNIQUE(sequence_id, taxon_id)
        );
        CREATE TABLE images (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            image_id TEXT UNIQUE, sequence_table_id INTEGER, frame_num INTEGER,
            url_gcp TEXT, url_aws TEXT, url_azure TEXT,
            FOREIGN KEY (sequence_table_id) REFERENCES sequences (id)
        );"
    ))
    .unwrap();
}

/// Write an observation CSV with the standard header
pub fn write_csv(dir: &Path, rows: &[&str]) -> PathBuf {
    let path = dir.join("observations.csv");
    let mut content = format!("{}\n", HEADER);
    for row in rows {
        content.push_str(row);
        content.push('\n');
    }
    fs::write(&path, content).unwrap();
    path
}

pub fn count(path: &Path, table: &str) -> i64 {
    let conn = Connection::open(path).unwrap();
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
        row.get(0)
    })
    .unwrap()
}
