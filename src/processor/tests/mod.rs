//! Tests for the two-pass pipeline
//!
//! Each test writes a small observation CSV to a temporary directory and runs
//! the passes against an in-memory database with the bootstrap schema.


use crate::config::PipelineConfig;
use crate::store::Store;
use rusqlite::params;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

pub const HEADER: &str = "kingdom,class,order,family,genus,species,common_name,sequence_id,location_id,datetime,image_id,frame_num,url_gcp,url_aws,url_azure";

/// A wildlife observation row for a carnivore at site-a
pub fn observation(
    genus: &str,
    species: &str,
    common_name: &str,
    burst: &str,
    image_id: &str,
    frame: &str,
) -> String {
    format!(
        "Animalia,Mammalia,Carnivora,,{genus},{species},{common_name},{burst},site-a,2023-05-01 10:00:00,{image_id},{frame},gs://bucket/{image_id}.jpg,,"
    )
}

pub fn coyote(burst: &str, image_id: &str, frame: &str) -> String {
    observation("Canis", "Canis latrans", "coyote", burst, image_id, frame)
}

pub fn puma(burst: &str, image_id: &str, frame: &str) -> String {
    observation("Puma", "Puma concolor", "puma", burst, image_id, frame)
}

/// A row with no taxonomy and no common name
pub fn blank(burst: &str, image_id: &str) -> String {
    format!(",,,,,,,{burst},site-a,2023-05-01 10:00:00,{image_id},1,,,")
}

/// Write the header plus `rows` to `observations.csv` in `dir`
pub fn write_csv(dir: &TempDir, rows: &[String]) -> PathBuf {
    let path = dir.path().join("observations.csv");
    let mut content = String::from(HEADER);
    content.push('\n');
    for row in rows {
        content.push_str(row);
        content.push('\n');
    }
    fs::write(&path, content).unwrap();
    path
}

pub fn test_config(input: PathBuf) -> PipelineConfig {
    PipelineConfig::new(input, ":memory:").with_progress(false)
}

/// Image ids of the sequence for (`burst`, `common_name`), in insertion order
pub fn images_for(store: &Store, burst: &str, common_name: &str) -> Vec<String> {
    let mut stmt = store
        .connection()
        .prepare(
            "SELECT i.image_id FROM images i
             JOIN sequences s ON i.sequence_table_id = s.id
             JOIN taxa t ON s.taxon_id = t.id
             WHERE s.sequence_id = ?1 AND t.common_name = ?2
             ORDER BY i.id",
        )
        .unwrap();
    stmt.query_map(params![burst, common_name], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<String>, _>>()
        .unwrap()
}

/// Taxon ids of all sequences sharing a burst identifier
pub fn sequence_taxa(store: &Store, burst: &str) -> Vec<i64> {
    let mut stmt = store
        .connection()
        .prepare("SELECT taxon_id FROM sequences WHERE sequence_id = ?1 ORDER BY taxon_id")
        .unwrap();
    stmt.query_map(params![burst], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<i64>, _>>()
        .unwrap()
}
