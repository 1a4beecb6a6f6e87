//! Storage traits and error types
//!
//! This module defines the trait interface for append-only storage backends and
//! associated error types.

use crate::record::{IngestEvent, Record};
use std::collections::HashSet;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Key contains a line break: {0:?}")]
    InvalidKey(String),
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Append-only persistence for one crawler
///
/// A write is complete only once it has been flushed to storage; callers rely
/// on that before updating any in-memory state derived from it.
pub trait Store {
    /// Appends a record to the record log
    fn append_record(&mut self, record: &Record) -> StoreResult<()>;

    /// Appends a dedup key to the key log
    fn append_key(&mut self, key: &str) -> StoreResult<()>;

    /// Appends an event to the event log (a no-op when events are disabled)
    fn append_event(&mut self, event: &IngestEvent) -> StoreResult<()>;

    /// Reads every key from the key log
    fn load_keys(&self) -> StoreResult<HashSet<String>>;
}
