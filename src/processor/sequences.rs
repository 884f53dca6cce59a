//! Pass 2: sequence and image batching
//!
//! Re-streams the input, buffering wildlife rows by raw burst identifier.
//! When enough distinct bursts are buffered the batch is flushed in one
//! transaction: each burst is split into one sequence per taxon observed in
//! it, and each sequence's rows become images ordered by frame index.
//!
//! Inserts are idempotent. A burst whose rows straddle two flushes resolves
//! to the same sequence row both times, and an image id that already exists
//! is ignored, so rerunning the pass over the same input adds nothing.

use super::progress::ProgressReporter;
use super::stats::{FlushStats, SequencePassStats};
use super::taxa::TaxonIdMap;
use crate::classifier::{frame_index, is_wildlife_row, normalize_field, taxon_key};
use crate::config::PipelineConfig;
use crate::error::{EtlError, Result, Stage};
use crate::models::{ObservationRow, TaxonKey};
use crate::reader::ObservationReader;
use crate::store::{NewImage, NewSequence, SequenceOutcome, Store, insert_image, insert_or_reuse_sequence};
use std::collections::BTreeMap;
use std::time::Instant;
use sysinfo::System;
use tracing::{debug, info, warn};

/// Rows of one burst that share a taxon, in input order
#[derive(Debug)]
pub struct TaxonGroup<'a> {
    pub key: TaxonKey,
    pub rows: Vec<&'a ObservationRow>,
}

/// Split a burst's rows into one group per taxon, in first-seen order
pub fn group_by_taxon(rows: &[ObservationRow]) -> Vec<TaxonGroup<'_>> {
    let mut groups: Vec<TaxonGroup<'_>> = Vec::new();
    for row in rows {
        let key = taxon_key(row);
        match groups.iter().position(|g| g.key == key) {
            Some(index) => groups[index].rows.push(row),
            None => groups.push(TaxonGroup {
                key,
                rows: vec![row],
            }),
        }
    }
    groups
}

/// Order rows by frame index; missing or unparseable frames sort first as 0
///
/// The sort is stable, so rows with equal frame indices keep input order.
pub fn order_frames(rows: &mut [&ObservationRow]) {
    rows.sort_by_key(|row| frame_index(row));
}

/// Wildlife rows buffered by burst identifier
#[derive(Debug, Default)]
pub struct BurstBuffer {
    bursts: BTreeMap<String, Vec<ObservationRow>>,
    rows: usize,
}

impl BurstBuffer {
    pub fn push(&mut self, burst_id: &str, row: ObservationRow) {
        match self.bursts.get_mut(burst_id) {
            Some(rows) => rows.push(row),
            None => {
                self.bursts.insert(burst_id.to_string(), vec![row]);
            }
        }
        self.rows += 1;
    }

    /// Distinct burst identifiers buffered
    pub fn burst_count(&self) -> usize {
        self.bursts.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.bursts.is_empty()
    }

    /// Take the buffered bursts, leaving the buffer empty
    pub fn take(&mut self) -> BTreeMap<String, Vec<ObservationRow>> {
        self.rows = 0;
        std::mem::take(&mut self.bursts)
    }
}

/// Buffers Pass 2 rows and flushes them to the store
pub struct SequenceBatcher<'a> {
    store: &'a mut Store,
    taxon_ids: &'a TaxonIdMap,
    flush_threshold: usize,
    memory_warning_threshold: f64,
    buffer: BurstBuffer,
    stats: SequencePassStats,
    system: System,
}

impl<'a> SequenceBatcher<'a> {
    pub fn new(store: &'a mut Store, taxon_ids: &'a TaxonIdMap, config: &PipelineConfig) -> Self {
        Self {
            store,
            taxon_ids,
            flush_threshold: config.flush_threshold,
            memory_warning_threshold: config.memory_warning_threshold,
            buffer: BurstBuffer::default(),
            stats: SequencePassStats::default(),
            system: System::new(),
        }
    }

    pub fn stats(&self) -> &SequencePassStats {
        &self.stats
    }

    pub fn buffered_bursts(&self) -> usize {
        self.buffer.burst_count()
    }

    /// Account for records that were consumed but could not be parsed
    pub fn record_malformed(&mut self, count: usize) {
        self.stats.rows_processed += count;
        self.stats.malformed_rows += count;
    }

    /// Buffer one input row, flushing once the burst threshold is reached
    pub fn push(&mut self, row: ObservationRow) -> Result<()> {
        self.stats.rows_processed += 1;

        if !is_wildlife_row(&row) {
            return Ok(());
        }
        self.stats.wildlife_rows += 1;

        let Some(burst_id) = normalize_field(&row.sequence_id).map(str::to_string) else {
            self.stats.rows_without_burst += 1;
            debug!("Record {} has no sequence_id, skipping", row.record_number);
            return Ok(());
        };

        self.buffer.push(&burst_id, row);
        if self.buffer.burst_count() >= self.flush_threshold {
            self.flush()?;
        }
        Ok(())
    }

    /// Flush remaining bursts and return the pass statistics
    pub fn finish(mut self) -> Result<SequencePassStats> {
        if !self.buffer.is_empty() {
            info!(
                "Processing final batch of {} sequences",
                self.buffer.burst_count()
            );
            self.flush()?;
        }
        Ok(self.stats)
    }

    /// Write all buffered bursts in one transaction
    pub fn flush(&mut self) -> Result<()> {
        let buffered_rows = self.buffer.row_count();
        let bursts = self.buffer.take();
        if bursts.is_empty() {
            return Ok(());
        }

        self.check_memory(buffered_rows);

        let rows_processed = self.stats.rows_processed;
        let storage_err =
            |e: rusqlite::Error| EtlError::storage(Stage::SequenceFlush, rows_processed, e);

        let mut flush = FlushStats {
            bursts: bursts.len(),
            rows: buffered_rows,
            ..FlushStats::default()
        };

        let tx = self.store.transaction().map_err(storage_err)?;
        for (burst_id, rows) in &bursts {
            for mut group in group_by_taxon(rows) {
                let Some(&taxon_id) = self.taxon_ids.get(&group.key) else {
                    warn!(
                        "Burst {}: taxon for record {} missing from Pass 1 map, skipping {} rows",
                        burst_id,
                        group.rows[0].record_number,
                        group.rows.len()
                    );
                    flush.unresolved_taxon_rows += group.rows.len();
                    continue;
                };

                let first = group.rows[0];
                let outcome = insert_or_reuse_sequence(
                    &tx,
                    &NewSequence {
                        sequence_id: burst_id,
                        taxon_id,
                        location_id: normalize_field(&first.location_id),
                        datetime: normalize_field(&first.datetime),
                    },
                )
                .map_err(storage_err)?;

                match outcome {
                    SequenceOutcome::Created(_) => flush.sequences_created += 1,
                    SequenceOutcome::Reused(_) => flush.sequences_reused += 1,
                }

                order_frames(&mut group.rows);
                for row in group.rows {
                    let Some(image_id) = normalize_field(&row.image_id) else {
                        flush.rows_without_image_id += 1;
                        continue;
                    };

                    let inserted = insert_image(
                        &tx,
                        &NewImage {
                            image_id,
                            sequence_table_id: outcome.id(),
                            frame_num: frame_index(row),
                            url_gcp: normalize_field(&row.url_gcp),
                            url_aws: normalize_field(&row.url_aws),
                            url_azure: normalize_field(&row.url_azure),
                        },
                    )
                    .map_err(storage_err)?;

                    if inserted {
                        flush.images_created += 1;
                    } else {
                        flush.images_ignored += 1;
                    }
                }
            }
        }
        tx.commit().map_err(storage_err)?;

        self.stats.record_flush(&flush);
        info!(
            "Batch {} committed: {} bursts, {} new sequences, {} new images (totals: {} sequences, {} images)",
            self.stats.flushes,
            flush.bursts,
            flush.sequences_created,
            flush.images_created,
            self.stats.sequences_created,
            self.stats.images_created
        );
        Ok(())
    }

    /// Log memory use at each flush so the threshold can be tuned
    fn check_memory(&mut self, buffered_rows: usize) {
        self.system.refresh_memory();
        let total = self.system.total_memory();
        if total == 0 {
            return;
        }
        let used = self.system.used_memory();
        let fraction = used as f64 / total as f64;

        debug!(
            "Memory checkpoint: {} buffered rows, system memory {} MB / {} MB",
            buffered_rows,
            used / 1024 / 1024,
            total / 1024 / 1024
        );
        if fraction > self.memory_warning_threshold {
            warn!(
                "System memory at {:.0}% with {} buffered rows; consider a lower flush threshold",
                fraction * 100.0,
                buffered_rows
            );
        }
    }
}

/// Run Pass 2 over the input using the finalized taxon id map
pub fn run_sequence_pass(
    config: &PipelineConfig,
    store: &mut Store,
    taxon_ids: &TaxonIdMap,
    total_rows: Option<usize>,
) -> Result<SequencePassStats> {
    info!("Pass 2: processing sequences and images");
    let start = Instant::now();

    let mut reader =
        ObservationReader::open(&config.input_path, Stage::SequenceScan, config.row_limit)?;
    let progress = ProgressReporter::new("Pass 2", total_rows, config.show_progress);
    let mut batcher = SequenceBatcher::new(store, taxon_ids, config);

    let outcome = stream_rows(&mut reader, &mut batcher, &progress, config.chunk_size)
        .and_then(|()| batcher.finish());
    let mut stats = match outcome {
        Ok(stats) => stats,
        Err(e) => {
            progress.finish_with_error(&e.to_string());
            return Err(e);
        }
    };

    stats.duration = start.elapsed();
    progress.finish(format!(
        "{} sequences, {} images",
        stats.sequences_created, stats.images_created
    ));
    info!("Pass 2 complete: {}", stats.summary());
    Ok(stats)
}

fn stream_rows(
    reader: &mut ObservationReader,
    batcher: &mut SequenceBatcher<'_>,
    progress: &ProgressReporter,
    chunk_size: usize,
) -> Result<()> {
    let mut chunks = 0usize;
    while let Some(chunk) = reader.next_chunk(chunk_size)? {
        chunks += 1;
        batcher.record_malformed(chunk.malformed);
        for row in chunk.rows {
            batcher.push(row)?;
        }

        progress.increment(chunk.records_read);
        progress.set_message(format!(
            "{} bursts buffered, {} sequences, {} images",
            batcher.buffered_bursts(),
            batcher.stats().sequences_created,
            batcher.stats().images_created
        ));
        debug!(
            "Chunk {}: {} - {} sequences in current batch",
            chunks,
            progress.describe(batcher.stats().rows_processed),
            batcher.buffered_bursts()
        );
    }
    Ok(())
}
