//! Shared building blocks for the TransGuard pipeline.
//!
//! Holds the error type, the normalized value model, the table schema
//! descriptors, value coercion rules, CLI settings and display formatting
//! used by both the loader and the reporter.

pub mod coercion;
pub mod error;
pub mod formatting;
pub mod models;
pub mod schema;
pub mod settings;

pub use error::{GuardError, Result};
