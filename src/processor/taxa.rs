//! Pass 1: taxon discovery and persistence
//!
//! Streams the whole input once, collecting every distinct taxon into a
//! [`TaxonRegistry`]. Only after the scan completes are the taxa written to
//! the store, so Pass 2 never sees a partial id map.

use super::progress::ProgressReporter;
use super::stats::TaxaPassStats;
use crate::classifier::{is_wildlife_row, taxon_from_row, taxon_key};
use crate::config::PipelineConfig;
use crate::error::{EtlError, Result, Stage};
use crate::models::{ObservationRow, Taxon, TaxonKey};
use crate::reader::ObservationReader;
use crate::store::{Store, insert_taxon};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::time::Instant;
use tracing::{debug, info};

/// Finalized mapping from taxon key to surrogate id
pub type TaxonIdMap = HashMap<TaxonKey, i64>;

/// Distinct taxa seen so far, in first-seen order
///
/// The first row carrying a key defines the taxon; later rows with the same
/// key never overwrite it.
#[derive(Debug, Default)]
pub struct TaxonRegistry {
    index: HashMap<TaxonKey, usize>,
    taxa: Vec<Taxon>,
}

/// Outcome of writing the registry to the store
#[derive(Debug)]
pub struct PersistedTaxa {
    pub ids: TaxonIdMap,
    pub inserted: usize,
    pub reused: usize,
}

impl TaxonRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a wildlife row; returns true if its taxon was not seen before
    pub fn observe(&mut self, row: &ObservationRow) -> bool {
        match self.index.entry(taxon_key(row)) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(self.taxa.len());
                self.taxa.push(taxon_from_row(row));
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.taxa.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taxa.is_empty()
    }

    /// Write every registered taxon, reusing ids already in the store
    ///
    /// New taxa are inserted in transactions of `commit_interval` rows. A
    /// failure aborts with a storage error; earlier commits stay in place and
    /// are reused on the next run.
    pub fn persist(
        self,
        store: &mut Store,
        commit_interval: usize,
        rows_processed: usize,
    ) -> Result<PersistedTaxa> {
        let storage_err =
            |e: rusqlite::Error| EtlError::storage(Stage::TaxaInsertion, rows_processed, e);

        let existing = store.load_taxon_ids().map_err(storage_err)?;
        let mut ids = TaxonIdMap::with_capacity(self.taxa.len());
        let mut pending = Vec::new();

        for taxon in self.taxa {
            let key = taxon.key();
            match existing.get(&key) {
                Some(&id) => {
                    ids.insert(key, id);
                }
                None => pending.push((key, taxon)),
            }
        }

        let reused = ids.len();
        if reused > 0 {
            info!("Reusing {} taxa already present in the database", reused);
        }

        let total = pending.len();
        let mut inserted = 0;
        for batch in pending.chunks(commit_interval.max(1)) {
            let tx = store.transaction().map_err(storage_err)?;
            for (key, taxon) in batch {
                let id = insert_taxon(&tx, taxon).map_err(storage_err)?;
                ids.insert(key.clone(), id);
            }
            tx.commit().map_err(storage_err)?;
            inserted += batch.len();
            debug!("Inserted {}/{} taxa", inserted, total);
        }

        Ok(PersistedTaxa {
            ids,
            inserted,
            reused,
        })
    }
}

/// Run Pass 1 over the input and persist the discovered taxa
///
/// `total_rows` comes from the row counter and only drives progress
/// reporting. Fails with [`EtlError::EmptyResult`] when no taxa are found.
pub fn run_taxa_pass(
    config: &PipelineConfig,
    store: &mut Store,
    total_rows: Option<usize>,
) -> Result<(TaxonIdMap, TaxaPassStats)> {
    info!("Pass 1: extracting unique taxa");
    let start = Instant::now();

    let mut reader =
        ObservationReader::open(&config.input_path, Stage::TaxaScan, config.row_limit)?;
    let progress = ProgressReporter::new("Pass 1", total_rows, config.show_progress);
    let mut registry = TaxonRegistry::new();
    let mut stats = TaxaPassStats::default();

    loop {
        let chunk = match reader.next_chunk(config.chunk_size) {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) => {
                progress.finish_with_error(&e.to_string());
                return Err(e);
            }
        };
        let chunk_start = Instant::now();
        stats.chunks += 1;
        stats.rows_processed += chunk.records_read;
        stats.malformed_rows += chunk.malformed;

        for row in &chunk.rows {
            if is_wildlife_row(row) {
                stats.wildlife_rows += 1;
                registry.observe(row);
            }
        }

        progress.increment(chunk.records_read);
        progress.set_message(format!(
            "{} wildlife, {} unique taxa",
            stats.wildlife_rows,
            registry.len()
        ));
        debug!(
            "Chunk {}: {} - {} wildlife, {} unique taxa - {:.2}s",
            stats.chunks,
            progress.describe(stats.rows_processed),
            stats.wildlife_rows,
            registry.len(),
            chunk_start.elapsed().as_secs_f64()
        );
    }

    stats.unique_taxa = registry.len();
    info!(
        "Pass 1 scan complete: {} rows, {} wildlife rows, {} unique taxa",
        stats.rows_processed,
        stats.wildlife_rows,
        stats.unique_taxa
    );

    if registry.is_empty() {
        progress.finish_with_error("no taxa found");
        return Err(EtlError::EmptyResult {
            rows_processed: stats.rows_processed,
        });
    }

    progress.set_message(format!("inserting {} taxa", registry.len()));
    let persisted = match registry.persist(store, config.taxa_commit_interval, stats.rows_processed)
    {
        Ok(persisted) => persisted,
        Err(e) => {
            progress.finish_with_error(&e.to_string());
            return Err(e);
        }
    };

    stats.taxa_inserted = persisted.inserted;
    stats.taxa_reused = persisted.reused;
    stats.duration = start.elapsed();
    progress.finish(format!("{} unique taxa", stats.unique_taxa));
    info!("Pass 1 complete: {}", stats.summary());

    Ok((persisted.ids, stats))
}
