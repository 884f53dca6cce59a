//! Chunked CSV reader for camera trap observation exports
//!
//! Streams the input in fixed-size chunks so peak memory is bounded by the
//! chunk size rather than the file size. Malformed records are logged and
//! skipped; an I/O failure part-way through the file is fatal.
//!
//! ## Usage
//!
//! ```no_run
//! use camera_trap_etl::error::Stage;
//! use camera_trap_etl::reader::ObservationReader;
//!
//! # fn example() -> camera_trap_etl::Result<()> {
//! let mut reader = ObservationReader::open("observations.csv", Stage::TaxaScan, None)?;
//! while let Some(chunk) = reader.next_chunk(1000)? {
//!     println!("{} rows ({} malformed)", chunk.rows.len(), chunk.malformed);
//! }
//! # Ok(())
//! # }
//! ```

pub mod column_mapping;

pub use column_mapping::ColumnMapping;

use crate::error::{EtlError, Result, Stage};
use crate::models::ObservationRow;
use csv::{ErrorKind, StringRecord};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One chunk of input records
#[derive(Debug, Default)]
pub struct Chunk {
    /// Successfully read rows, in input order
    pub rows: Vec<ObservationRow>,
    /// Records consumed from the input, including malformed ones
    pub records_read: usize,
    /// Records skipped because they could not be parsed
    pub malformed: usize,
}

/// Streaming reader yielding [`ObservationRow`] chunks
///
/// Errors name the pass the reader was opened for, since both passes read
/// the same file.
pub struct ObservationReader<R = File> {
    path: PathBuf,
    stage: Stage,
    reader: csv::Reader<R>,
    mapping: ColumnMapping,
    record: StringRecord,
    records_read: usize,
    row_limit: Option<usize>,
    exhausted: bool,
}

impl ObservationReader<File> {
    /// Open an input file and resolve its header
    ///
    /// `row_limit` caps the number of data records consumed, counting
    /// malformed records, so both passes see the same prefix of the file.
    pub fn open(path: impl AsRef<Path>, stage: Stage, row_limit: Option<usize>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(EtlError::InputNotFound { path });
        }

        let file = File::open(&path).map_err(|e| {
            EtlError::io(format!("{}: failed to open {}", stage, path.display()), e)
        })?;
        Self::from_reader(file, path, stage, row_limit)
    }
}

impl<R: Read> ObservationReader<R> {
    /// Wrap an already-open CSV source; `path` is only used in messages
    pub fn from_reader(
        source: R,
        path: impl Into<PathBuf>,
        stage: Stage,
        row_limit: Option<usize>,
    ) -> Result<Self> {
        let path = path.into();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(source);

        let headers = reader
            .headers()
            .map_err(|e| {
                EtlError::input(&path, format!("{}: failed to read CSV header", stage), e)
            })?
            .clone();
        let mapping = ColumnMapping::analyze(&headers);

        let missing = mapping.missing_columns();
        if !missing.is_empty() {
            debug!(
                "Input {} lacks {} expected columns (read as empty): {}",
                path.display(),
                missing.len(),
                missing.join(", ")
            );
        }
        if !mapping.has_taxonomy() {
            warn!(
                "Input {} has no taxonomic or common_name columns; no rows will classify as wildlife",
                path.display()
            );
        }

        Ok(Self {
            path,
            stage,
            reader,
            mapping,
            record: StringRecord::new(),
            records_read: 0,
            row_limit,
            exhausted: false,
        })
    }

    /// Total data records consumed so far
    pub fn records_read(&self) -> usize {
        self.records_read
    }

    /// Read the next chunk of up to `chunk_size` records
    ///
    /// Returns `Ok(None)` once the input (or the row limit) is exhausted.
    pub fn next_chunk(&mut self, chunk_size: usize) -> Result<Option<Chunk>> {
        if self.exhausted {
            return Ok(None);
        }

        let mut chunk = Chunk {
            rows: Vec::with_capacity(chunk_size),
            ..Chunk::default()
        };

        while chunk.records_read < chunk_size {
            if self.row_limit.is_some_and(|limit| self.records_read >= limit) {
                self.exhausted = true;
                break;
            }

            match self.reader.read_record(&mut self.record) {
                Ok(true) => {
                    self.records_read += 1;
                    chunk.records_read += 1;
                    chunk
                        .rows
                        .push(self.mapping.build_row(&self.record, self.records_read as u64));
                }
                Ok(false) => {
                    self.exhausted = true;
                    break;
                }
                Err(e) => {
                    if matches!(e.kind(), ErrorKind::Io(_)) {
                        return Err(EtlError::input(
                            &self.path,
                            format!(
                                "{}: read failed after {} records",
                                self.stage, self.records_read
                            ),
                            e,
                        ));
                    }
                    self.records_read += 1;
                    chunk.records_read += 1;
                    chunk.malformed += 1;
                    warn!(
                        "{}: skipping malformed record {}: {}",
                        self.stage, self.records_read, e
                    );
                }
            }
        }

        if chunk.records_read == 0 {
            Ok(None)
        } else {
            Ok(Some(chunk))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor, Write};
    use tempfile::NamedTempFile;

    /// Serves its bytes, then fails every later read
    struct FailingSource {
        data: Cursor<Vec<u8>>,
    }

    impl Read for FailingSource {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.data.read(buf)? {
                0 => Err(io::Error::other("device unplugged")),
                n => Ok(n),
            }
        }
    }

    fn write_input(bytes: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_open_missing_file() {
        let result = ObservationReader::open("/definitely/not/here.csv", Stage::TaxaScan, None);
        assert!(matches!(result, Err(EtlError::InputNotFound { .. })));
    }

    #[test]
    fn test_reads_in_chunks() {
        let file = write_input(
            b"sequence_id,species,image_id\n1,Canis latrans,a\n2,Canis latrans,b\n3,Puma concolor,c\n",
        );
        let mut reader = ObservationReader::open(file.path(), Stage::TaxaScan, None).unwrap();

        let first = reader.next_chunk(2).unwrap().unwrap();
        assert_eq!(first.rows.len(), 2);
        assert_eq!(first.rows[0].record_number, 1);
        assert_eq!(first.rows[1].image_id, "b");

        let second = reader.next_chunk(2).unwrap().unwrap();
        assert_eq!(second.rows.len(), 1);
        assert_eq!(second.rows[0].rank("species"), Some("Puma concolor"));

        assert!(reader.next_chunk(2).unwrap().is_none());
        assert_eq!(reader.records_read(), 3);
    }

    #[test]
    fn test_row_limit_caps_records() {
        let file = write_input(b"sequence_id,species\n1,a\n2,b\n3,c\n4,d\n");
        let mut reader = ObservationReader::open(file.path(), Stage::TaxaScan, Some(3)).unwrap();

        let chunk = reader.next_chunk(10).unwrap().unwrap();
        assert_eq!(chunk.rows.len(), 3);
        assert!(reader.next_chunk(10).unwrap().is_none());
    }

    #[test]
    fn test_malformed_record_is_skipped() {
        let mut bytes = b"sequence_id,species\n1,Canis latrans\n2,".to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe]);
        bytes.extend_from_slice(b"\n3,Puma concolor\n");
        let file = write_input(&bytes);

        let mut reader = ObservationReader::open(file.path(), Stage::TaxaScan, None).unwrap();
        let chunk = reader.next_chunk(10).unwrap().unwrap();

        assert_eq!(chunk.records_read, 3);
        assert_eq!(chunk.malformed, 1);
        assert_eq!(chunk.rows.len(), 2);
        assert_eq!(chunk.rows[1].record_number, 3);
    }

    #[test]
    fn test_header_only_input() {
        let file = write_input(b"sequence_id,species\n");
        let mut reader = ObservationReader::open(file.path(), Stage::TaxaScan, None).unwrap();
        assert!(reader.next_chunk(10).unwrap().is_none());
    }

    #[test]
    fn test_read_failure_names_the_pass() {
        let source = FailingSource {
            data: Cursor::new(b"sequence_id,species\n1,Canis latrans\n".to_vec()),
        };
        let mut reader =
            ObservationReader::from_reader(source, "observations.csv", Stage::SequenceScan, None)
                .unwrap();

        let err = reader.next_chunk(10).unwrap_err();

        assert!(matches!(err, EtlError::Input { .. }));
        let message = err.to_string();
        assert!(message.contains("observations.csv"), "{}", message);
        assert!(message.contains("pass 2 (sequence scan)"), "{}", message);
        assert!(message.contains("after 1 records"), "{}", message);
    }

    #[test]
    fn test_header_failure_names_the_pass() {
        let source = FailingSource {
            data: Cursor::new(Vec::new()),
        };
        let err = ObservationReader::from_reader(source, "observations.csv", Stage::TaxaScan, None)
            .err()
            .unwrap();
        assert!(err.to_string().contains("pass 1 (taxa scan)"));
    }
}
