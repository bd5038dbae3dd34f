use std::path::PathBuf;
use thiserror::Error;

/// Boxed error from a third-party driver (database, query builder).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// All errors produced by the TransGuard pipeline.
#[derive(Error, Debug)]
pub enum GuardError {
    /// A source file could not be opened, or a record in it could not be read.
    #[error("Failed to read source {path}: {source}")]
    SourceRead {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// A column named by the table schema is missing from the source header.
    #[error("Source {path} has no column `{column}` required by table {table}")]
    SchemaMismatch {
        path: PathBuf,
        table: String,
        column: String,
    },

    /// A required field could not be coerced to its target type.
    #[error("Cannot coerce {table}.{column} at row {row}: {value:?} is not a valid {expected}")]
    ValueCoercion {
        table: String,
        column: String,
        row: u64,
        value: String,
        expected: &'static str,
    },

    /// A table schema descriptor failed validation.
    #[error("Invalid schema for table {table}: {reason}")]
    InvalidSchema { table: String, reason: String },

    /// Appending a window to the destination table failed.
    #[error("Failed to append window {window} to {table}: {source}")]
    Append {
        table: String,
        window: usize,
        #[source]
        source: BoxError,
    },

    /// Creating a destination table failed.
    #[error("Failed to create table {table}: {source}")]
    CreateTable {
        table: String,
        #[source]
        source: BoxError,
    },

    /// The relational store could not be reached.
    #[error("Cannot connect to store: {0}")]
    Connection(#[source] BoxError),

    /// An aggregate query failed.
    #[error("Query for {view} failed: {source}")]
    Query {
        view: &'static str,
        #[source]
        source: BoxError,
    },

    /// A report filter was rejected before reaching the store.
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the guard crates.
pub type Result<T> = std::result::Result<T, GuardError>;
