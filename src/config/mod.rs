//! Configuration module for Newsline
//!
//! Sources are described in a TOML file (`[[source]]` tables plus an optional
//! `[supervisor]` table). Each source's crawl knobs can then be overridden from
//! the environment and finally from the command line.
//!
//! # Example
//!
//! ```no_run
//! use newsline::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("newsline.toml")).unwrap();
//! for source in &config.sources {
//!     println!("{} looks back {} days", source.name, source.crawl.days_back);
//! }
//! ```

mod env;
mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlSettings, PolicyKind, SourceConfig, SourceKind, SupervisorConfig,
    DEFAULT_USER_AGENT,
};

pub use env::{apply_env_overrides, apply_overrides};
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::{validate, validate_source};
