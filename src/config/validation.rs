use crate::config::types::{Config, CrawlSettings, SourceConfig, SourceKind, SupervisorConfig};
use crate::ConfigError;
use regex::Regex;
use std::collections::HashSet;
use url::Url;

/// Upper bound for backoff and rate-limit delays (seconds)
const MAX_DELAY_SECONDS: f64 = 3600.0;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_supervisor_config(&config.supervisor)?;

    let mut names = HashSet::new();
    for source in &config.sources {
        if !names.insert(source.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "source name '{}' is defined more than once",
                source.name
            )));
        }
        validate_source(source)?;
    }

    Ok(())
}

fn validate_supervisor_config(config: &SupervisorConfig) -> Result<(), ConfigError> {
    if config.poll_tick_ms < 10 {
        return Err(ConfigError::Validation(format!(
            "poll_tick_ms must be >= 10ms, got {}ms",
            config.poll_tick_ms
        )));
    }

    Ok(())
}

/// Validates a single source, including its crawl settings
pub fn validate_source(source: &SourceConfig) -> Result<(), ConfigError> {
    // Source names end up in file names, keep them boring
    if source.name.is_empty() {
        return Err(ConfigError::Validation(
            "source name cannot be empty".to_string(),
        ));
    }

    if !source
        .name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "source name must contain only ASCII letters, digits, '-' and '_', got '{}'",
            source.name
        )));
    }

    if let Some(command) = &source.command {
        if command.is_empty() {
            return Err(ConfigError::Validation(format!(
                "source '{}' has an empty command",
                source.name
            )));
        }
    }

    match source.kind {
        SourceKind::Html => validate_html_source(source)?,
        SourceKind::Telegram => {
            if source.channels.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "telegram source '{}' must list at least one channel",
                    source.name
                )));
            }
        }
    }

    validate_crawl_settings(&source.name, &source.crawl)
}

fn validate_html_source(source: &SourceConfig) -> Result<(), ConfigError> {
    let base_url = source.base_url.as_deref().ok_or_else(|| {
        ConfigError::Validation(format!("source '{}' requires base_url", source.name))
    })?;
    parse_http_url("base_url", base_url)?;

    let section_url = source.section_url.as_deref().ok_or_else(|| {
        ConfigError::Validation(format!("source '{}' requires section_url", source.name))
    })?;
    parse_http_url("section_url", section_url)?;

    if let Some(template) = &source.page_url_template {
        if !template.contains("{page}") {
            return Err(ConfigError::Validation(format!(
                "page_url_template must contain a {{page}} placeholder, got '{}'",
                template
            )));
        }
    }

    if let Some(pattern) = &source.article_path_pattern {
        Regex::new(pattern).map_err(|e| {
            ConfigError::Validation(format!("invalid article_path_pattern '{}': {}", pattern, e))
        })?;
    }

    Ok(())
}

fn validate_crawl_settings(name: &str, crawl: &CrawlSettings) -> Result<(), ConfigError> {
    if crawl.interval_minutes < 1 || crawl.pause_interval_minutes < 1 {
        return Err(ConfigError::Validation(format!(
            "source '{}': interval_minutes and pause_interval_minutes must be >= 1",
            name
        )));
    }

    if crawl.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "source '{}': max_pages must be >= 1, got {}",
            name, crawl.max_pages
        )));
    }

    if crawl.timeout_seconds < 1 || crawl.sink_timeout_seconds < 1 {
        return Err(ConfigError::Validation(format!(
            "source '{}': timeouts must be >= 1 second",
            name
        )));
    }

    if crawl.retry_count < 1 {
        return Err(ConfigError::Validation(format!(
            "source '{}': retry_count must be >= 1, got {}",
            name, crawl.retry_count
        )));
    }

    if !(0.0..=MAX_DELAY_SECONDS).contains(&crawl.backoff_seconds) {
        return Err(ConfigError::Validation(format!(
            "source '{}': backoff_seconds must be between 0 and {}, got {}",
            name, MAX_DELAY_SECONDS, crawl.backoff_seconds
        )));
    }

    if !(crawl.rate_delay_min >= 0.0
        && crawl.rate_delay_min <= crawl.rate_delay_max
        && crawl.rate_delay_max <= MAX_DELAY_SECONDS)
    {
        return Err(ConfigError::Validation(format!(
            "source '{}': rate delay must satisfy 0 <= min <= max <= {}, got {}..{}",
            name, MAX_DELAY_SECONDS, crawl.rate_delay_min, crawl.rate_delay_max
        )));
    }

    if let Some(sink_url) = &crawl.sink_url {
        parse_http_url("sink_url", sink_url)?;
    }

    Ok(())
}

fn parse_http_url(field: &str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            field, value
        )));
    }

    Ok(url)
}
