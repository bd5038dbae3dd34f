//! Column normalization: rename, reorder and coerce raw source rows.
//!
//! The [`Normalizer`] resolves each schema column to its position in the
//! source header once, then maps every raw row onto the canonical column
//! order. Source columns the schema does not name are never read.

use std::path::Path;

use csv::StringRecord;
use guard_core::coercion::{coerce, Coerced};
use guard_core::error::{GuardError, Result};
use guard_core::models::{FieldValue, Record};
use guard_core::schema::{ColumnKind, ColumnSpec, Requirement, TableSchema};
use tracing::{debug, warn};

use crate::reader::SourceWindow;

/// Result of normalizing a single row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    /// The row was mapped; `absent` counts optional values that could not be
    /// coerced and were stored as absent.
    Kept { record: Record, absent: u64 },
    /// A required column was empty, so the row was dropped.
    Skipped { column: &'static str },
}

/// Normalized contents of one window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedWindow {
    pub records: Vec<Record>,
    pub skipped: u64,
    pub values_absent: u64,
}

/// Maps raw rows of one source onto one table schema.
#[derive(Debug)]
pub struct Normalizer<'a> {
    schema: &'a TableSchema,
    /// Header position of each schema column, in schema order.
    positions: Vec<usize>,
}

impl<'a> Normalizer<'a> {
    /// Resolve every schema column against `headers`.
    ///
    /// Fails with [`GuardError::SchemaMismatch`] naming the first schema
    /// column missing from the header.
    pub fn new(schema: &'a TableSchema, headers: &StringRecord, path: &Path) -> Result<Self> {
        let positions = schema
            .columns
            .iter()
            .map(|col| {
                headers
                    .iter()
                    .position(|h| h == col.source)
                    .ok_or_else(|| GuardError::SchemaMismatch {
                        path: path.to_path_buf(),
                        table: schema.table.to_string(),
                        column: col.source.to_string(),
                    })
            })
            .collect::<Result<Vec<usize>>>()?;

        Ok(Self { schema, positions })
    }

    pub fn schema(&self) -> &TableSchema {
        self.schema
    }

    /// Normalize one raw row. `source_row` is used for error context only.
    pub fn normalize_row(&self, row: &StringRecord, source_row: u64) -> Result<RowOutcome> {
        let mut values = Vec::with_capacity(self.positions.len());
        let mut absent = 0u64;

        for (col, &pos) in self.schema.columns.iter().zip(&self.positions) {
            let raw = row.get(pos).unwrap_or("");

            let value = match (coerce(col.kind, raw), col.requirement) {
                (Coerced::Value(v), _) => v,
                (Coerced::Empty, Requirement::Optional) => absent_value(col.kind),
                (Coerced::Empty, Requirement::Required) => {
                    return Ok(RowOutcome::Skipped {
                        column: col.canonical,
                    });
                }
                (Coerced::Rejected { expected }, Requirement::Optional) => {
                    debug!(
                        table = self.schema.table,
                        column = col.canonical,
                        row = source_row,
                        value = raw,
                        "storing unparseable {} as absent",
                        expected
                    );
                    absent += 1;
                    absent_value(col.kind)
                }
                (Coerced::Rejected { expected }, Requirement::Required) => {
                    return Err(self.coercion_error(col, source_row, raw, expected));
                }
            };
            values.push(value);
        }

        Ok(RowOutcome::Kept {
            record: Record { source_row, values },
            absent,
        })
    }

    /// Normalize every row of `window`.
    ///
    /// The first required-column coercion failure aborts the whole window.
    pub fn normalize_window(&self, window: &SourceWindow) -> Result<NormalizedWindow> {
        let mut out = NormalizedWindow {
            records: Vec::with_capacity(window.rows.len()),
            ..Default::default()
        };

        for (source_row, row) in window.numbered_rows() {
            match self.normalize_row(row, source_row)? {
                RowOutcome::Kept { record, absent } => {
                    out.values_absent += absent;
                    out.records.push(record);
                }
                RowOutcome::Skipped { column } => {
                    warn!(
                        table = self.schema.table,
                        row = source_row,
                        "dropping row with empty required column `{}`",
                        column
                    );
                    out.skipped += 1;
                }
            }
        }

        Ok(out)
    }

    fn coercion_error(
        &self,
        col: &ColumnSpec,
        row: u64,
        raw: &str,
        expected: &'static str,
    ) -> GuardError {
        GuardError::ValueCoercion {
            table: self.schema.table.to_string(),
            column: col.canonical.to_string(),
            row,
            value: raw.to_string(),
            expected,
        }
    }
}

/// The typed "absent" sentinel for a column kind.
fn absent_value(kind: ColumnKind) -> FieldValue {
    match kind {
        ColumnKind::Text => FieldValue::Text(None),
        ColumnKind::Integer => FieldValue::Integer(None),
        ColumnKind::Float => FieldValue::Float(None),
        ColumnKind::Currency => FieldValue::Decimal(None),
        ColumnKind::Date => FieldValue::Date(None),
        ColumnKind::Timestamp => FieldValue::Timestamp(None),
        ColumnKind::Flag => FieldValue::Flag(None),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
