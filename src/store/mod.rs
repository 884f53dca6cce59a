//! SQLite store for taxa, sequences and images
//!
//! Owns the connection to the pre-existing database and every statement the
//! pipeline issues. Write helpers take a `&Connection` so they run inside
//! whichever transaction the caller opened, and return `rusqlite` errors
//! unwrapped so the caller can tag them with the stage and progress reached.

pub mod schema;

use crate::constants::{RANK_COUNT, TAXA_RANK_COLUMNS};
use crate::error::{EtlError, Result};
use crate::models::{Taxon, TaxonKey};
use rusqlite::{Connection, OpenFlags, OptionalExtension, Transaction, params, params_from_iter};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// New sequence row for one (burst, taxon) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSequence<'a> {
    pub sequence_id: &'a str,
    pub taxon_id: i64,
    pub location_id: Option<&'a str>,
    pub datetime: Option<&'a str>,
}

/// New image row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewImage<'a> {
    pub image_id: &'a str,
    pub sequence_table_id: i64,
    pub frame_num: i64,
    pub url_gcp: Option<&'a str>,
    pub url_aws: Option<&'a str>,
    pub url_azure: Option<&'a str>,
}

/// Result of an insert-or-reuse on the sequences table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceOutcome {
    Created(i64),
    Reused(i64),
}

impl SequenceOutcome {
    pub fn id(&self) -> i64 {
        match self {
            Self::Created(id) | Self::Reused(id) => *id,
        }
    }
}

/// Row counts of the output tables
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableCounts {
    pub taxa: usize,
    pub sequences: usize,
    pub images: usize,
}

/// Handle on the destination database
pub struct Store {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Store {
    /// Open an existing database and verify its schema
    ///
    /// The file is never created: a missing database means the schema
    /// bootstrap has not run.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(EtlError::DatabaseNotFound {
                path: path.to_path_buf(),
            });
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        info!("Opened database {}", path.display());

        let mut store = Self::from_connection(conn)?;
        store.path = Some(path.to_path_buf());
        Ok(store)
    }

    /// Wrap an already-open connection, verifying its schema
    pub fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "cache_size", 10000)?;
        conn.pragma_update(None, "temp_store", "MEMORY")?;
        schema::verify_schema(&conn)?;
        Ok(Self { conn, path: None })
    }

    /// Database file path, if the store was opened from disk
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Begin a transaction; dropping it without commit rolls back
    pub fn transaction(&mut self) -> rusqlite::Result<Transaction<'_>> {
        self.conn.transaction()
    }

    /// Load every persisted taxon keyed by its composite key
    ///
    /// When duplicates exist (left by an earlier non-idempotent loader) the
    /// lowest id wins.
    pub fn load_taxon_ids(&self) -> rusqlite::Result<HashMap<TaxonKey, i64>> {
        let sql = format!(
            "SELECT id, {}, common_name FROM taxa ORDER BY id",
            TAXA_RANK_COLUMNS.join(", ")
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            let id: i64 = row.get(0)?;
            let mut fields: [String; RANK_COUNT + 1] = Default::default();
            for (index, field) in fields.iter_mut().enumerate() {
                *field = row.get::<_, Option<String>>(index + 1)?.unwrap_or_default();
            }
            Ok((TaxonKey::new(fields), id))
        })?;

        let mut ids = HashMap::new();
        for row in rows {
            let (key, id) = row?;
            ids.entry(key).or_insert(id);
        }
        debug!("Loaded {} existing taxa", ids.len());
        Ok(ids)
    }

    /// Count rows in each output table
    pub fn table_counts(&self) -> rusqlite::Result<TableCounts> {
        let count = |table: &str| -> rusqlite::Result<usize> {
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                    row.get::<_, i64>(0)
                })
                .map(|n| n as usize)
        };

        Ok(TableCounts {
            taxa: count("taxa")?,
            sequences: count("sequences")?,
            images: count("images")?,
        })
    }

    /// Random sample of named taxa for the run report
    pub fn sample_taxa(&self, limit: usize) -> rusqlite::Result<Vec<Taxon>> {
        let sql = format!(
            "SELECT {}, common_name, most_specific_level, most_specific_name
             FROM taxa WHERE most_specific_name IS NOT NULL
             ORDER BY RANDOM() LIMIT ?1",
            TAXA_RANK_COLUMNS.join(", ")
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let taxa = stmt
            .query_map(params![limit as i64], |row| {
                let mut ranks: [Option<String>; RANK_COUNT] = Default::default();
                for (index, rank) in ranks.iter_mut().enumerate() {
                    *rank = row.get(index)?;
                }
                Ok(Taxon {
                    ranks,
                    common_name: row.get(RANK_COUNT)?,
                    most_specific_level: row.get(RANK_COUNT + 1)?,
                    most_specific_name: row.get(RANK_COUNT + 2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(taxa)
    }
}

/// Insert a taxon and return its surrogate id
pub fn insert_taxon(conn: &Connection, taxon: &Taxon) -> rusqlite::Result<i64> {
    let placeholders = (1..=RANK_COUNT + 3)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO taxa ({}, common_name, most_specific_level, most_specific_name) VALUES ({})",
        TAXA_RANK_COLUMNS.join(", "),
        placeholders
    );

    let values = taxon
        .ranks
        .iter()
        .map(Option::as_deref)
        .chain([
            taxon.common_name.as_deref(),
            taxon.most_specific_level.as_deref(),
            taxon.most_specific_name.as_deref(),
        ]);

    let mut stmt = conn.prepare_cached(&sql)?;
    stmt.execute(params_from_iter(values))?;
    Ok(conn.last_insert_rowid())
}

/// Insert a sequence, or fetch the existing id for the same (burst, taxon)
pub fn insert_or_reuse_sequence(
    conn: &Connection,
    sequence: &NewSequence<'_>,
) -> rusqlite::Result<SequenceOutcome> {
    let mut insert = conn.prepare_cached(
        "INSERT OR IGNORE INTO sequences (sequence_id, taxon_id, location_id, datetime)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    let inserted = insert.execute(params![
        sequence.sequence_id,
        sequence.taxon_id,
        sequence.location_id,
        sequence.datetime,
    ])?;

    if inserted > 0 {
        return Ok(SequenceOutcome::Created(conn.last_insert_rowid()));
    }

    let mut select =
        conn.prepare_cached("SELECT id FROM sequences WHERE sequence_id = ?1 AND taxon_id = ?2")?;
    let existing = select
        .query_row(params![sequence.sequence_id, sequence.taxon_id], |row| {
            row.get::<_, i64>(0)
        })
        .optional()?;

    // An ignored insert without a matching row means some other constraint fired
    existing
        .map(SequenceOutcome::Reused)
        .ok_or(rusqlite::Error::QueryReturnedNoRows)
}

/// Insert an image; returns false when the image id already exists
pub fn insert_image(conn: &Connection, image: &NewImage<'_>) -> rusqlite::Result<bool> {
    let mut stmt = conn.prepare_cached(
        "INSERT OR IGNORE INTO images (image_id, sequence_table_id, frame_num, url_gcp, url_aws, url_azure)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    let inserted = stmt.execute(params![
        image.image_id,
        image.sequence_table_id,
        image.frame_num,
        image.url_gcp,
        image.url_aws,
        image.url_azure,
    ])?;
    Ok(inserted > 0)
}

#[cfg(test)]
pub(crate) fn test_store() -> Store {
    let conn = Connection::open_in_memory().unwrap();
    schema::create_test_schema(&conn);
    Store::from_connection(conn).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::taxon_from_row;
    use crate::models::ObservationRow;

    fn taxon(species: &str, common_name: &str) -> Taxon {
        let mut row = ObservationRow::new(1);
        row.set_rank("species", species);
        row.common_name = common_name.to_string();
        taxon_from_row(&row)
    }

    #[test]
    fn test_open_missing_database() {
        let result = Store::open(Path::new("/no/such/dir/camera_trap_data.db"));
        assert!(matches!(result, Err(EtlError::DatabaseNotFound { .. })));
    }

    #[test]
    fn test_insert_and_load_taxa() {
        let store = test_store();
        let coyote = taxon("Canis latrans", "coyote");
        let puma = taxon("Puma concolor", "");

        let coyote_id = insert_taxon(store.connection(), &coyote).unwrap();
        let puma_id = insert_taxon(store.connection(), &puma).unwrap();
        assert_ne!(coyote_id, puma_id);

        let ids = store.load_taxon_ids().unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids.get(&coyote.key()), Some(&coyote_id));
        assert_eq!(ids.get(&puma.key()), Some(&puma_id));
    }

    #[test]
    fn test_load_taxa_prefers_lowest_id_for_duplicates() {
        let store = test_store();
        let coyote = taxon("Canis latrans", "coyote");
        let first = insert_taxon(store.connection(), &coyote).unwrap();
        insert_taxon(store.connection(), &coyote).unwrap();

        let ids = store.load_taxon_ids().unwrap();
        assert_eq!(ids.len(), 1);
        assert_eq!(ids[&coyote.key()], first);
    }

    #[test]
    fn test_sequence_insert_or_reuse() {
        let store = test_store();
        let taxon_id = insert_taxon(store.connection(), &taxon("Canis latrans", "")).unwrap();
        let sequence = NewSequence {
            sequence_id: "1001",
            taxon_id,
            location_id: Some("site-a"),
            datetime: None,
        };

        let created = insert_or_reuse_sequence(store.connection(), &sequence).unwrap();
        let reused = insert_or_reuse_sequence(store.connection(), &sequence).unwrap();

        assert!(matches!(created, SequenceOutcome::Created(_)));
        assert_eq!(reused, SequenceOutcome::Reused(created.id()));
        assert_eq!(store.table_counts().unwrap().sequences, 1);
    }

    #[test]
    fn test_duplicate_image_is_ignored() {
        let store = test_store();
        let taxon_id = insert_taxon(store.connection(), &taxon("Canis latrans", "")).unwrap();
        let sequence_id = insert_or_reuse_sequence(
            store.connection(),
            &NewSequence {
                sequence_id: "1001",
                taxon_id,
                location_id: None,
                datetime: None,
            },
        )
        .unwrap()
        .id();

        let image = NewImage {
            image_id: "img-1",
            sequence_table_id: sequence_id,
            frame_num: 1,
            url_gcp: Some("gs://bucket/img-1.jpg"),
            url_aws: None,
            url_azure: None,
        };

        assert!(insert_image(store.connection(), &image).unwrap());
        assert!(!insert_image(store.connection(), &image).unwrap());
        assert_eq!(store.table_counts().unwrap().images, 1);
    }

    #[test]
    fn test_transaction_rollback_on_drop() {
        let mut store = test_store();
        {
            let tx = store.transaction().unwrap();
            insert_taxon(&tx, &taxon("Canis latrans", "")).unwrap();
        }
        assert_eq!(store.table_counts().unwrap().taxa, 0);
    }

    #[test]
    fn test_sample_taxa() {
        let store = test_store();
        insert_taxon(store.connection(), &taxon("Canis latrans", "coyote")).unwrap();
        insert_taxon(store.connection(), &taxon("", "mystery")).unwrap();

        let sample = store.sample_taxa(5).unwrap();
        assert_eq!(sample.len(), 1);
        assert_eq!(sample[0].label(), "Canis latrans");
    }
}
