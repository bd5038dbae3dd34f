//! In-memory [`RecordSink`] for dry runs and tests.

use std::sync::Mutex;

use async_trait::async_trait;
use guard_core::error::{GuardError, Result};
use guard_core::models::Record;
use guard_core::schema::TableSchema;

/// One recorded append call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendCall {
    pub table: String,
    pub window: usize,
    pub rows: usize,
}

/// Counts appended windows without storing records.
#[derive(Debug, Default)]
pub struct MemorySink {
    calls: Mutex<Vec<AppendCall>>,
    fail_at: Option<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose append of window `window` fails.
    pub fn failing_at(window: usize) -> Self {
        Self {
            fail_at: Some(window),
            ..Self::default()
        }
    }

    /// Successful append calls, in order.
    pub fn calls(&self) -> Vec<AppendCall> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Rows appended to `table` across all windows.
    pub fn total_rows(&self, table: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|c| c.table == table)
            .map(|c| c.rows)
            .sum()
    }
}

#[async_trait]
impl super::RecordSink for MemorySink {
    async fn append(&self, schema: &TableSchema, window: usize, records: &[Record]) -> Result<u64> {
        if self.fail_at == Some(window) {
            return Err(GuardError::Append {
                table: schema.table.to_string(),
                window,
                source: "simulated store failure".into(),
            });
        }

        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(AppendCall {
                table: schema.table.to_string(),
                window,
                rows: records.len(),
            });
        Ok(records.len() as u64)
    }
}
