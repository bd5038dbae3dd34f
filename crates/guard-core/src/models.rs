use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Serialize;

/// A single normalized field value.
///
/// Every variant carries an `Option` so an absent value keeps its column
/// type; the store binds `None` as a typed SQL `NULL`.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(Option<String>),
    Integer(Option<i64>),
    Float(Option<f64>),
    /// Money, rounded to two decimal places.
    Decimal(Option<Decimal>),
    Date(Option<NaiveDate>),
    Timestamp(Option<NaiveDateTime>),
    Flag(Option<bool>),
}

impl FieldValue {
    /// `true` when the value is the explicit "absent" sentinel.
    pub fn is_absent(&self) -> bool {
        match self {
            FieldValue::Text(v) => v.is_none(),
            FieldValue::Integer(v) => v.is_none(),
            FieldValue::Float(v) => v.is_none(),
            FieldValue::Decimal(v) => v.is_none(),
            FieldValue::Date(v) => v.is_none(),
            FieldValue::Timestamp(v) => v.is_none(),
            FieldValue::Flag(v) => v.is_none(),
        }
    }
}

/// One source row mapped onto a table's canonical column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// 1-based data row in the source file (header excluded).
    pub source_row: u64,
    /// Values in the order of the table schema's columns.
    pub values: Vec<FieldValue>,
}

/// Outcome of loading one source file into one table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Destination table name.
    pub table: String,
    /// Number of append calls issued (one per window).
    pub windows: usize,
    /// Data rows read from the source.
    pub rows_read: u64,
    /// Rows appended to the destination.
    pub rows_appended: u64,
    /// Rows dropped because a required field was empty.
    pub rows_skipped: u64,
    /// Optional fields that could not be coerced and were stored as absent.
    pub values_absent: u64,
}

impl LoadReport {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Default::default()
        }
    }
}
