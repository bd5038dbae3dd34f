//! Ingestion layer for TransGuard.
//!
//! Reads the users, cards and transactions CSV sources in bounded windows,
//! normalizes every row onto its table's canonical schema and appends each
//! window to the relational store in one transaction.

pub mod loader;
pub mod normalizer;
pub mod reader;
pub mod store;

pub use guard_core as core;
