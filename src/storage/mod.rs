//! Storage module for persisting crawl output
//!
//! This module handles everything a crawler writes to disk:
//! - The append-only record log
//! - The append-only dedup key log and its in-memory index
//! - The companion event log
//!
//! Files are single-writer (one crawler process per source) and are never
//! rewritten or compacted.

mod dedup;
mod jsonl;
mod traits;

pub use dedup::{normalize, DedupIndex};
pub use jsonl::JsonlStore;
pub use traits::{Store, StoreError, StoreResult};

use std::path::Path;

/// Opens the file store for a source
pub fn open_store(data_dir: &Path, source_name: &str, events_enabled: bool) -> JsonlStore {
    JsonlStore::new(data_dir, source_name, events_enabled)
}
