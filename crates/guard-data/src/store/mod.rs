//! Destination stores for normalized records.
//!
//! [`RecordSink`] is the seam the loader writes through. [`SqlStore`] is the
//! relational implementation, generic over a [`SqlDatabase`] backend marker
//! so PostgreSQL and SQLite share one body of code.

pub mod memory;

use std::marker::PhantomData;

use async_trait::async_trait;
use guard_core::error::Result;
use guard_core::models::{FieldValue, Record};
use guard_core::schema::{ColumnKind, Requirement, TableSchema};
use sea_query::{
    Alias, ColumnDef, ForeignKey, InsertStatement, Query, SelectStatement, SimpleExpr, Table,
    TableCreateStatement, Value,
};

/// Rows per rendered `INSERT` statement within one window.
pub const INSERT_CHUNK_ROWS: usize = 1_000;

/// Accepts one window of normalized records at a time.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Append `records` to `schema.table` atomically.
    ///
    /// Returns the number of rows appended. `window` is the 1-based window
    /// index, reported in errors.
    async fn append(&self, schema: &TableSchema, window: usize, records: &[Record]) -> Result<u64>;
}

/// A SQL backend: its pool type and how it renders statements.
pub trait SqlDatabase: Send + Sync + 'static {
    type Pool: Clone + Send + Sync;

    fn build_select(stmt: SelectStatement) -> String;

    fn build_insert(stmt: InsertStatement) -> String;

    fn build_table_create(stmt: TableCreateStatement) -> String;

    /// SQL for the calendar day of a date or timestamp `column`.
    fn day_of(column: &str) -> String;
}

/// Relational store over a connection pool of backend `DB`.
pub struct SqlStore<DB: SqlDatabase> {
    pool: DB::Pool,
    _marker: PhantomData<DB>,
}

impl<DB: SqlDatabase> SqlStore<DB> {
    pub fn new(pool: DB::Pool) -> Self {
        Self {
            pool,
            _marker: PhantomData,
        }
    }

    pub fn pool(&self) -> &DB::Pool {
        &self.pool
    }
}

impl<DB: SqlDatabase> Clone for SqlStore<DB> {
    fn clone(&self) -> Self {
        Self::new(self.pool.clone())
    }
}

/// `CREATE TABLE IF NOT EXISTS` for a table descriptor.
pub fn table_create_statement(schema: &TableSchema) -> TableCreateStatement {
    let mut stmt = Table::create();
    stmt.table(Alias::new(schema.table)).if_not_exists();

    for col in schema.columns {
        let mut def = ColumnDef::new(Alias::new(col.canonical));
        match col.kind {
            ColumnKind::Text => def.text(),
            ColumnKind::Integer => def.big_integer(),
            ColumnKind::Float => def.double(),
            ColumnKind::Currency => def.decimal_len(14, 2),
            ColumnKind::Date => def.date(),
            ColumnKind::Timestamp => def.timestamp(),
            ColumnKind::Flag => def.boolean(),
        };
        if col.canonical == schema.primary_key {
            def.not_null().primary_key();
        } else if col.requirement == Requirement::Required {
            def.not_null();
        }
        stmt.col(&mut def);
    }

    for fk in schema.foreign_keys {
        stmt.foreign_key(
            ForeignKey::create()
                .from(Alias::new(schema.table), Alias::new(fk.column))
                .to(Alias::new(fk.references), Alias::new(fk.referenced_column)),
        );
    }

    stmt
}

/// Typed SQL value for a field; absent values become typed `NULL`s.
pub fn to_sql_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Text(v) => v.clone().into(),
        FieldValue::Integer(v) => (*v).into(),
        FieldValue::Float(v) => (*v).into(),
        FieldValue::Decimal(v) => (*v).into(),
        FieldValue::Date(v) => (*v).into(),
        FieldValue::Timestamp(v) => (*v).into(),
        FieldValue::Flag(v) => (*v).into(),
    }
}

/// Multi-row `INSERT` statements for `records`, at most
/// [`INSERT_CHUNK_ROWS`] rows each.
///
/// A record whose value count differs from the column count is reported as
/// `Err(source_row)`.
pub fn insert_statements(
    schema: &TableSchema,
    records: &[Record],
) -> std::result::Result<Vec<InsertStatement>, u64> {
    let width = schema.columns.len();
    records
        .chunks(INSERT_CHUNK_ROWS)
        .map(|chunk| {
            let mut stmt = Query::insert();
            stmt.into_table(Alias::new(schema.table))
                .columns(schema.canonical_names().map(Alias::new));
            for record in chunk {
                if record.values.len() != width {
                    return Err(record.source_row);
                }
                stmt.values_panic(
                    record
                        .values
                        .iter()
                        .map(|v| SimpleExpr::Value(to_sql_value(v))),
                );
            }
            Ok(stmt)
        })
        .collect()
}

/// Implements table creation and [`RecordSink`] for one backend.
macro_rules! impl_sql_store {
    ($db_type:ty) => {
        impl SqlStore<$db_type> {
            /// Create `users`, `cards` and `transactions` if they do not exist.
            pub async fn create_tables(&self) -> guard_core::error::Result<()> {
                use guard_core::error::GuardError;
                use guard_core::schema::ALL_TABLES;

                for schema in ALL_TABLES {
                    let sql = <$db_type>::build_table_create(table_create_statement(schema));
                    sqlx::query(&sql).execute(&self.pool).await.map_err(|e| {
                        GuardError::CreateTable {
                            table: schema.table.to_string(),
                            source: Box::new(e),
                        }
                    })?;
                    tracing::debug!("Ensured table {}", schema.table);
                }
                Ok(())
            }
        }

        #[async_trait::async_trait]
        impl RecordSink for SqlStore<$db_type> {
            async fn append(
                &self,
                schema: &TableSchema,
                window: usize,
                records: &[Record],
            ) -> guard_core::error::Result<u64> {
                use guard_core::error::{BoxError, GuardError};

                let append_err = |source: BoxError| GuardError::Append {
                    table: schema.table.to_string(),
                    window,
                    source,
                };

                if records.is_empty() {
                    return Ok(0);
                }

                // Rendered up front: sea-query statements are not `Send`.
                let statements: Vec<String> = insert_statements(schema, records)
                    .map_err(|row| {
                        append_err(format!("row {row} does not match the column count").into())
                    })?
                    .into_iter()
                    .map(<$db_type>::build_insert)
                    .collect();

                let mut tx = self
                    .pool
                    .begin()
                    .await
                    .map_err(|e| append_err(e.into()))?;
                for sql in &statements {
                    sqlx::query(sql)
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| append_err(e.into()))?;
                }
                tx.commit().await.map_err(|e| append_err(e.into()))?;

                Ok(records.len() as u64)
            }
        }
    };
}

pub mod postgres {
    //! PostgreSQL backend.

    use std::str::FromStr;

    use guard_core::error::{GuardError, Result};
    use guard_core::settings::DatabaseSettings;
    use sea_query::PostgresQueryBuilder;
    use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
    use sqlx::PgPool;
    use tracing::info;

    use super::{insert_statements, table_create_statement, RecordSink, SqlDatabase, SqlStore};
    use guard_core::models::Record;
    use guard_core::schema::TableSchema;

    /// PostgreSQL backend marker.
    pub struct Postgres;

    impl SqlDatabase for Postgres {
        type Pool = PgPool;

        fn build_select(stmt: sea_query::SelectStatement) -> String {
            stmt.to_string(PostgresQueryBuilder)
        }

        fn build_insert(stmt: sea_query::InsertStatement) -> String {
            stmt.to_string(PostgresQueryBuilder)
        }

        fn build_table_create(stmt: sea_query::TableCreateStatement) -> String {
            stmt.to_string(PostgresQueryBuilder)
        }

        fn day_of(column: &str) -> String {
            format!("CAST({column} AS DATE)")
        }
    }

    pub type PostgresStore = SqlStore<Postgres>;

    /// Open a single-connection pool from `DATABASE_URL` or the individual
    /// connection parameters.
    pub async fn connect(db: &DatabaseSettings) -> Result<PostgresStore> {
        let options = match &db.database_url {
            Some(url) => {
                PgConnectOptions::from_str(url).map_err(|e| GuardError::Connection(Box::new(e)))?
            }
            None => PgConnectOptions::new()
                .host(&db.db_host)
                .port(db.db_port)
                .username(&db.db_user)
                .password(&db.db_password)
                .database(&db.db_name),
        };

        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| GuardError::Connection(Box::new(e)))?;

        info!("Connected to {}", db.describe());
        Ok(SqlStore::new(pool))
    }

    impl_sql_store!(Postgres);
}

pub mod sqlite {
    //! SQLite backend, used for local runs and tests.

    use std::str::FromStr;

    use guard_core::error::{GuardError, Result};
    use sea_query::SqliteQueryBuilder;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use sqlx::SqlitePool;
    use tracing::info;

    use super::{insert_statements, table_create_statement, RecordSink, SqlDatabase, SqlStore};
    use guard_core::models::Record;
    use guard_core::schema::TableSchema;

    /// SQLite backend marker.
    pub struct Sqlite;

    impl SqlDatabase for Sqlite {
        type Pool = SqlitePool;

        fn build_select(stmt: sea_query::SelectStatement) -> String {
            stmt.to_string(SqliteQueryBuilder)
        }

        fn build_insert(stmt: sea_query::InsertStatement) -> String {
            stmt.to_string(SqliteQueryBuilder)
        }

        fn build_table_create(stmt: sea_query::TableCreateStatement) -> String {
            stmt.to_string(SqliteQueryBuilder)
        }

        // CAST(.. AS DATE) has NUMERIC affinity in SQLite and keeps only the year.
        fn day_of(column: &str) -> String {
            format!("DATE({column})")
        }
    }

    pub type SqliteStore = SqlStore<Sqlite>;

    /// Open a single-connection pool for a `sqlite:` URL.
    ///
    /// The connection is never recycled, so `sqlite::memory:` keeps its
    /// contents for the life of the pool.
    pub async fn connect(url: &str) -> Result<SqliteStore> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| GuardError::Connection(Box::new(e)))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| GuardError::Connection(Box::new(e)))?;

        info!("Opened {}", url);
        Ok(SqlStore::new(pool))
    }

    impl_sql_store!(Sqlite);
}

// ── Tests ─────────────────────────────────────────────────────────────────────
