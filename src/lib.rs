//! Newsline: an incremental news ingester
//!
//! This crate polls several independently-paced sources (news sections, public
//! channel previews), keeps only what is new since the previous pass, appends it
//! to per-source logs and optionally forwards it to a downstream API that can
//! ask the crawler to back off. A supervisor keeps one crawler process per
//! source alive.

pub mod config;
pub mod crawler;
pub mod record;
pub mod shutdown;
pub mod sink;
pub mod source;
pub mod storage;
pub mod supervisor;

use thiserror::Error;

/// Main error type for Newsline operations
#[derive(Debug, Error)]
pub enum NewslineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] crawler::FetchError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StoreError),

    #[error("Supervisor error: {0}")]
    Supervisor(#[from] supervisor::SupervisorError),

    #[error("Invalid record: {0}")]
    Record(#[from] record::RecordError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Source error: {0}")]
    Source(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Unknown source '{0}'")]
    UnknownSource(String),
}

/// Result type alias for Newsline operations
pub type Result<T> = std::result::Result<T, NewslineError>;

// Re-export commonly used types
pub use config::{Config, SourceConfig};
pub use crawler::{CrawlEngine, CrawlIteration, IterationOutcome, StopReason};
pub use record::{Candidate, IngestEvent, Record};
pub use source::SourceAdapter;
