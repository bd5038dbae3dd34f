//! CSV source reading in bounded windows.
//!
//! A [`SourceReader`] holds one open file and hands out consecutive
//! [`SourceWindow`]s, so at most one window of raw rows is in memory at a
//! time regardless of the file size.

use std::fs::File;
use std::path::{Path, PathBuf};

use csv::StringRecord;
use guard_core::error::{GuardError, Result};
use tracing::debug;

/// Upper bound on the rows pre-allocated for one window.
const MAX_PREALLOCATED_ROWS: usize = 4_096;

/// A contiguous slice of raw source rows.
#[derive(Debug, Clone)]
pub struct SourceWindow {
    /// 1-based window index within the source.
    pub index: usize,
    /// 1-based data row number of the first row in this window.
    pub first_row: u64,
    pub rows: Vec<StringRecord>,
}

impl SourceWindow {
    /// Iterate over `(source_row, record)` pairs.
    pub fn numbered_rows(&self) -> impl Iterator<Item = (u64, &StringRecord)> {
        (self.first_row..).zip(self.rows.iter())
    }
}

/// Streaming reader over one delimited source file with a header row.
pub struct SourceReader {
    path: PathBuf,
    reader: csv::Reader<File>,
    headers: StringRecord,
    rows_read: u64,
    windows_read: usize,
}

impl SourceReader {
    /// Open `path` and read its header row.
    pub fn open(path: &Path) -> Result<Self> {
        let read_err = |source: csv::Error| GuardError::SourceRead {
            path: path.to_path_buf(),
            source,
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .from_path(path)
            .map_err(read_err)?;
        let headers = reader.headers().map_err(read_err)?.clone();

        debug!(
            "Opened {} with {} columns",
            path.display(),
            headers.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            reader,
            headers,
            rows_read: 0,
            windows_read: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The (trimmed) header row.
    pub fn headers(&self) -> &StringRecord {
        &self.headers
    }

    /// Data rows handed out so far.
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    /// Read up to `size` rows. Returns `None` once the source is exhausted.
    pub fn next_window(&mut self, size: usize) -> Result<Option<SourceWindow>> {
        let mut rows = Vec::with_capacity(size.min(MAX_PREALLOCATED_ROWS));
        let mut record = StringRecord::new();

        while rows.len() < size {
            let more = self
                .reader
                .read_record(&mut record)
                .map_err(|source| GuardError::SourceRead {
                    path: self.path.clone(),
                    source,
                })?;
            if !more {
                break;
            }
            rows.push(record.clone());
        }

        if rows.is_empty() {
            return Ok(None);
        }

        let first_row = self.rows_read + 1;
        self.rows_read += rows.len() as u64;
        self.windows_read += 1;

        Ok(Some(SourceWindow {
            index: self.windows_read,
            first_row,
            rows,
        }))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
