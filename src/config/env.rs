//! Environment override layer
//!
//! Every crawl knob can be overridden by a `<PREFIX>_<KNOB>` variable, e.g.
//! `LENTA_DAYS_BACK=3`. Blank values are ignored and unparseable values are
//! logged and ignored, leaving the value from the config file (or the default)
//! in place.

use crate::config::types::SourceConfig;
use std::path::PathBuf;
use std::str::FromStr;

/// Applies overrides from the process environment
pub fn apply_env_overrides(source: &mut SourceConfig, prefix: &str) {
    apply_overrides(source, prefix, |key| std::env::var(key).ok());
}

/// Applies overrides read through `lookup`
///
/// `lookup` receives the full variable name (`<PREFIX>_<KNOB>`).
pub fn apply_overrides<F>(source: &mut SourceConfig, prefix: &str, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |knob: &str| -> Option<String> {
        lookup(&format!("{}_{}", prefix, knob))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    if let Some(v) = get("SOURCE_NAME") {
        source.name = v;
    }
    if let Some(v) = get("BASE_URL") {
        source.base_url = Some(v);
    }
    if let Some(v) = get("SECTION_URL") {
        source.section_url = Some(v);
    }

    let crawl = &mut source.crawl;
    set_parsed(&mut crawl.interval_minutes, "INTERVAL_MINUTES", get("INTERVAL_MINUTES"));
    set_parsed(
        &mut crawl.pause_interval_minutes,
        "PAUSE_INTERVAL_MINUTES",
        get("PAUSE_INTERVAL_MINUTES"),
    );
    set_parsed(&mut crawl.days_back, "DAYS_BACK", get("DAYS_BACK"));
    set_parsed(&mut crawl.max_pages, "MAX_PAGES", get("MAX_PAGES"));
    set_parsed(&mut crawl.timeout_seconds, "TIMEOUT_SECONDS", get("TIMEOUT_SECONDS"));
    set_parsed(&mut crawl.retry_count, "RETRY_COUNT", get("RETRY_COUNT"));
    set_parsed(&mut crawl.backoff_seconds, "BACKOFF_SECONDS", get("BACKOFF_SECONDS"));
    set_parsed(&mut crawl.rate_delay_min, "RATE_DELAY_MIN", get("RATE_DELAY_MIN"));
    set_parsed(&mut crawl.rate_delay_max, "RATE_DELAY_MAX", get("RATE_DELAY_MAX"));
    set_parsed(
        &mut crawl.sink_timeout_seconds,
        "SINK_TIMEOUT_SECONDS",
        get("SINK_TIMEOUT_SECONDS"),
    );

    if let Some(v) = get("USER_AGENT") {
        crawl.user_agent = v;
    }
    if let Some(v) = get("ACCEPT_LANGUAGE") {
        crawl.accept_language = v;
    }
    if let Some(v) = get("REFERER") {
        crawl.referer = Some(v);
    }
    if let Some(v) = get("LOG_LEVEL") {
        crawl.log_level = v;
    }
    if let Some(v) = get("DISABLE_DEDUP") {
        crawl.disable_dedup = parse_flag(&v);
    }
    if let Some(v) = get("DATA_DIR") {
        crawl.data_dir = PathBuf::from(v);
    }
    if let Some(v) = get("SINK_URL") {
        crawl.sink_url = Some(v);
    }
}

fn set_parsed<T: FromStr>(slot: &mut T, knob: &str, raw: Option<String>) {
    let Some(raw) = raw else {
        return;
    };

    match raw.parse::<T>() {
        Ok(value) => *slot = value,
        Err(_) => tracing::warn!(knob, value = %raw, "ignoring unparseable override"),
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
