//! Batched source → store loading.

use std::path::Path;

use guard_core::error::Result;
use guard_core::models::LoadReport;
use guard_core::schema::{self, TableSchema, CARDS, TRANSACTIONS, USERS};
use tracing::{debug, info};

use crate::normalizer::Normalizer;
use crate::reader::SourceReader;
use crate::store::RecordSink;

/// How a source is split into append calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Windowing {
    /// The whole source in one append.
    Single,
    /// At most `n` rows per append.
    Fixed(usize),
}

impl Windowing {
    fn rows(self) -> usize {
        match self {
            Windowing::Single => usize::MAX,
            Windowing::Fixed(n) => n.max(1),
        }
    }
}

/// Reads sources, normalizes them and hands windows to a [`RecordSink`].
pub struct Loader<S> {
    sink: S,
    window_size: usize,
}

impl<S: RecordSink> Loader<S> {
    /// `window_size` applies to transactions; users and cards load whole.
    pub fn new(sink: S, window_size: usize) -> Self {
        Self {
            sink,
            window_size: window_size.max(1),
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Load one source file into one table.
    ///
    /// Windows are appended in source order. When window `k` fails, windows
    /// `1..k` stay appended and the error is returned.
    pub async fn load_table(
        &self,
        schema: &TableSchema,
        path: &Path,
        windowing: Windowing,
    ) -> Result<LoadReport> {
        let mut reader = SourceReader::open(path)?;
        let normalizer = Normalizer::new(schema, reader.headers(), path)?;
        let mut report = LoadReport::new(schema.table);

        info!("Loading {} from {}", schema.table, path.display());

        while let Some(window) = reader.next_window(windowing.rows())? {
            let normalized = normalizer.normalize_window(&window)?;
            report.rows_skipped += normalized.skipped;
            report.values_absent += normalized.values_absent;

            if normalized.records.is_empty() {
                debug!(
                    "{} window {} has no rows to append",
                    schema.table, window.index
                );
                continue;
            }

            let appended = self
                .sink
                .append(schema, window.index, &normalized.records)
                .await?;
            report.windows += 1;
            report.rows_appended += appended;

            info!(
                "{}: appended window {} ({} rows, {} total)",
                schema.table, window.index, appended, report.rows_appended
            );
        }

        report.rows_read = reader.rows_read();
        info!(
            "Loaded {}: {} read, {} appended, {} skipped",
            schema.table, report.rows_read, report.rows_appended, report.rows_skipped
        );
        Ok(report)
    }

    pub async fn load_users(&self, path: &Path) -> Result<LoadReport> {
        self.load_table(&USERS, path, Windowing::Single).await
    }

    pub async fn load_cards(&self, path: &Path) -> Result<LoadReport> {
        self.load_table(&CARDS, path, Windowing::Single).await
    }

    pub async fn load_transactions(&self, path: &Path) -> Result<LoadReport> {
        self.load_table(&TRANSACTIONS, path, Windowing::Fixed(self.window_size))
            .await
    }

    /// Load users, cards and transactions from `data_dir`, in that order.
    ///
    /// Stops at the first failing table; tables loaded before it stay loaded.
    pub async fn load_all(&self, data_dir: &Path) -> Result<Vec<LoadReport>> {
        schema::validate_all()?;

        let users = self.load_users(&data_dir.join(USERS.source_file)).await?;
        let cards = self.load_cards(&data_dir.join(CARDS.source_file)).await?;
        let transactions = self
            .load_transactions(&data_dir.join(TRANSACTIONS.source_file))
            .await?;

        Ok(vec![users, cards, transactions])
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemorySink;
    use guard_core::error::GuardError;
    use std::fs::File;
    use std::io::{BufWriter, Write};
    use std::path::PathBuf;
    use tempfile::TempDir;

    const TXN_HEADER: &str =
        "id,date,client_id,card_id,amount,use_chip,merchant_id,merchant_city,merchant_state,zip,mcc,errors";

    fn write_transactions(dir: &Path, rows: usize, bad_row: Option<usize>) -> PathBuf {
        let path = dir.join(TRANSACTIONS.source_file);
        let mut out = BufWriter::new(File::create(&path).unwrap());
        writeln!(out, "{TXN_HEADER}").unwrap();
        for i in 1..=rows {
            let amount = if Some(i) == bad_row {
                "twelve".to_string()
            } else {
                format!("${}.{:02}", i % 500, i % 100)
            };
            let errors = if i % 10 == 0 { "Bad PIN" } else { "" };
            writeln!(
                out,
                "{i},2019-03-0{} 12:00:00,{},{},{amount},Chip Transaction,{},Austin,TX,78701.0,5411,{errors}",
                (i % 9) + 1,
                i % 2000,
                i % 6000,
                i % 300
            )
            .unwrap();
        }
        out.flush().unwrap();
        path
    }

    fn write_file(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        path
    }

    // ── windowing ──────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_transactions_split_into_fixed_windows() {
        let dir = TempDir::new().unwrap();
        let path = write_transactions(dir.path(), 60_000, None);
        let loader = Loader::new(MemorySink::new(), 25_000);

        let report = loader.load_transactions(&path).await.unwrap();

        let calls = loader.sink().calls();
        let sizes: Vec<usize> = calls.iter().map(|c| c.rows).collect();
        assert_eq!(sizes, vec![25_000, 25_000, 10_000]);
        assert_eq!(
            calls.iter().map(|c| c.window).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(report.windows, 3);
        assert_eq!(report.rows_read, 60_000);
        assert_eq!(report.rows_appended, 60_000);
        assert_eq!(report.rows_skipped, 0);
    }

    #[tokio::test]
    async fn test_appended_plus_skipped_equals_read() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            dir.path(),
            "t.csv",
            &[
                TXN_HEADER,
                "1,2019-01-01,1,1,$5.00,,,,,,,",
                "2,2019-01-01,1,1,,,,,,,,",
                "3,2019-01-01,,1,$5.00,,,,,,,",
                "4,2019-01-01,1,1,$7.50,,,,,,,",
                "5,not a date,1,1,$1.00,,,,,,,",
            ],
        );
        let loader = Loader::new(MemorySink::new(), 2);

        let report = loader
            .load_table(&TRANSACTIONS, &path, Windowing::Fixed(2))
            .await
            .unwrap();

        assert_eq!(report.rows_read, 5);
        assert_eq!(report.rows_skipped, 2);
        assert_eq!(report.rows_appended, 3);
        assert_eq!(report.rows_appended + report.rows_skipped, report.rows_read);
        assert_eq!(report.values_absent, 1);
    }

    #[tokio::test]
    async fn test_fully_skipped_window_is_not_appended() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            dir.path(),
            "t.csv",
            &[
                TXN_HEADER,
                "1,,1,1,,,,,,,,",
                "2,,1,1,,,,,,,,",
                "3,,1,1,$1.00,,,,,,,",
            ],
        );
        let loader = Loader::new(MemorySink::new(), 2);

        let report = loader.load_transactions(&path).await.unwrap();

        let calls = loader.sink().calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].window, 2);
        assert_eq!(report.windows, 1);
        assert_eq!(report.rows_appended, 1);
    }

    #[tokio::test]
    async fn test_single_windowing_appends_once() {
        let dir = TempDir::new().unwrap();
        let path = write_transactions(dir.path(), 1_234, None);
        let loader = Loader::new(MemorySink::new(), 10);

        let report = loader
            .load_table(&TRANSACTIONS, &path, Windowing::Single)
            .await
            .unwrap();

        assert_eq!(loader.sink().calls().len(), 1);
        assert_eq!(report.rows_appended, 1_234);
    }

    // ── failure handling ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_coercion_failure_keeps_earlier_windows() {
        let dir = TempDir::new().unwrap();
        let path = write_transactions(dir.path(), 50, Some(25));
        let loader = Loader::new(MemorySink::new(), 10);

        let err = loader.load_transactions(&path).await.unwrap_err();

        match err {
            GuardError::ValueCoercion { row, column, .. } => {
                assert_eq!(row, 25);
                assert_eq!(column, "amount");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(loader.sink().total_rows("transactions"), 20);
    }

    #[tokio::test]
    async fn test_sink_failure_keeps_earlier_windows() {
        let dir = TempDir::new().unwrap();
        let path = write_transactions(dir.path(), 30, None);
        let loader = Loader::new(MemorySink::failing_at(3), 10);

        let err = loader.load_transactions(&path).await.unwrap_err();

        assert!(matches!(err, GuardError::Append { window: 3, .. }));
        assert_eq!(loader.sink().calls().len(), 2);
        assert_eq!(loader.sink().total_rows("transactions"), 20);
    }

    #[tokio::test]
    async fn test_missing_column_fails_before_any_append() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "t.csv", &["id,date,amount", "1,2019-01-01,$1"]);
        let loader = Loader::new(MemorySink::new(), 10);

        let err = loader.load_transactions(&path).await.unwrap_err();

        assert!(matches!(err, GuardError::SchemaMismatch { .. }));
        assert!(loader.sink().calls().is_empty());
    }

    // ── load_all ───────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_load_all_in_dependency_order() {
        let dir = TempDir::new().unwrap();
        write_file(
            dir.path(),
            USERS.source_file,
            &[
                "id,current_age,retirement_age,birth_year,birth_month,gender,address,latitude,longitude,per_capita_income,yearly_income,total_debt,credit_score,num_credit_cards",
                "1,40,65,1984,5,Male,1 Main St,30.2,-97.7,$20000,$45000,$1000,700,2",
            ],
        );
        write_file(
            dir.path(),
            CARDS.source_file,
            &[
                "id,client_id,card_brand,card_type,card_number,expires,cvv,has_chip,num_cards_issued,credit_limit,acct_open_date,year_pin_last_changed,card_on_dark_web",
                "1,1,Visa,Debit,4000000000000000,12/2022,123,YES,1,$5000,01/2010,2015,No",
            ],
        );
        write_transactions(dir.path(), 3, None);
        let loader = Loader::new(MemorySink::new(), 25_000);

        let reports = loader.load_all(dir.path()).await.unwrap();

        let tables: Vec<&str> = reports.iter().map(|r| r.table.as_str()).collect();
        assert_eq!(tables, vec!["users", "cards", "transactions"]);
        let order: Vec<String> = loader
            .sink()
            .calls()
            .into_iter()
            .map(|c| c.table)
            .collect();
        assert_eq!(order, vec!["users", "cards", "transactions"]);
    }

    #[tokio::test]
    async fn test_load_all_missing_source() {
        let dir = TempDir::new().unwrap();
        let loader = Loader::new(MemorySink::new(), 10);
        let err = loader.load_all(dir.path()).await.unwrap_err();
        assert!(matches!(err, GuardError::SourceRead { .. }));
    }
}
