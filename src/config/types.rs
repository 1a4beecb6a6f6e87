use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Desktop browser user agent sent when a source does not configure its own
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Main configuration structure for Newsline
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceConfig>,
}

impl Config {
    /// Looks up a source by name
    ///
    /// When `name` is `None` the configuration must contain exactly one source,
    /// which is returned.
    pub fn source(&self, name: Option<&str>) -> Result<&SourceConfig, crate::ConfigError> {
        match name {
            Some(name) => self
                .sources
                .iter()
                .find(|s| s.name == name)
                .ok_or_else(|| crate::ConfigError::UnknownSource(name.to_string())),
            None => match self.sources.as_slice() {
                [only] => Ok(only),
                _ => Err(crate::ConfigError::Validation(format!(
                    "--source is required when the config defines {} sources",
                    self.sources.len()
                ))),
            },
        }
    }
}

/// How the supervisor reacts when a child process exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    /// Relaunch only the child that exited
    #[default]
    Restart,
    /// Tear the whole group down and exit with the child's code
    FailFast,
}

/// Process supervisor configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SupervisorConfig {
    pub policy: PolicyKind,

    /// Delay before relaunching an exited child (milliseconds)
    pub restart_delay_ms: u64,

    /// Liveness polling tick (milliseconds)
    pub poll_tick_ms: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            policy: PolicyKind::Restart,
            restart_delay_ms: 1_000,
            poll_tick_ms: 1_000,
        }
    }
}

impl SupervisorConfig {
    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }

    pub fn poll_tick(&self) -> Duration {
        Duration::from_millis(self.poll_tick_ms)
    }
}

/// Which adapter a source is crawled with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// A news site section listing article links
    #[default]
    Html,
    /// Public Telegram channel web previews (t.me/s/...)
    Telegram,
}

/// One crawled source
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SourceConfig {
    /// Source name, recorded in every record and used to name the data files
    pub name: String,

    #[serde(default)]
    pub kind: SourceKind,

    /// Explicit command line the supervisor launches for this source
    #[serde(default)]
    pub command: Option<Vec<String>>,

    /// Site root; article links outside of it are ignored
    #[serde(default)]
    pub base_url: Option<String>,

    /// First listing page
    #[serde(default)]
    pub section_url: Option<String>,

    /// Listing URL for pages 2 and up, with a `{page}` placeholder
    #[serde(default)]
    pub page_url_template: Option<String>,

    /// Regex an article link path must match
    #[serde(default)]
    pub article_path_pattern: Option<String>,

    /// Channels crawled by the telegram adapter
    #[serde(default)]
    pub channels: Vec<String>,

    #[serde(flatten)]
    pub crawl: CrawlSettings,
}

impl SourceConfig {
    /// Creates a source with default crawl settings and no adapter fields set
    pub fn new(name: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            command: None,
            base_url: None,
            section_url: None,
            page_url_template: None,
            article_path_pattern: None,
            channels: Vec::new(),
            crawl: CrawlSettings::default(),
        }
    }
}

/// Per-source crawl behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlSettings {
    /// Sleep between iterations (minutes)
    pub interval_minutes: u64,

    /// Sleep after the sink asked for a pause (minutes)
    pub pause_interval_minutes: u64,

    /// Look-back window for the cutoff (days)
    pub days_back: u32,

    /// Maximum listing pages per iteration
    pub max_pages: u32,

    /// Per-request timeout (seconds)
    pub timeout_seconds: u64,

    /// Attempts per request, including the first
    pub retry_count: u32,

    /// Backoff base (seconds), doubled on each attempt
    pub backoff_seconds: f64,

    /// Inter-candidate delay bounds (seconds)
    pub rate_delay_min: f64,
    pub rate_delay_max: f64,

    pub user_agent: String,
    pub accept_language: String,

    /// Referer header; the section URL is used when unset
    pub referer: Option<String>,

    pub log_level: String,
    pub disable_dedup: bool,

    /// Directory holding the record, key and event logs
    pub data_dir: PathBuf,

    /// Write the companion event log
    pub events_enabled: bool,

    /// Downstream push endpoint; no sink when unset
    pub sink_url: Option<String>,
    pub sink_timeout_seconds: u64,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            interval_minutes: 10,
            pause_interval_minutes: 5,
            days_back: 2,
            max_pages: 10,
            timeout_seconds: 15,
            retry_count: 3,
            backoff_seconds: 1.0,
            rate_delay_min: 0.5,
            rate_delay_max: 1.5,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_language: "ru-RU,ru;q=0.9".to_string(),
            referer: None,
            log_level: "info".to_string(),
            disable_dedup: false,
            data_dir: PathBuf::from("data"),
            events_enabled: true,
            sink_url: None,
            sink_timeout_seconds: 10,
        }
    }
}

impl CrawlSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }

    pub fn pause_interval(&self) -> Duration {
        Duration::from_secs(self.pause_interval_minutes * 60)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}
