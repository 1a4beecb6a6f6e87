//! Source adapters
//!
//! A source adapter knows how one origin lists its items and how a single item
//! is turned into a [`Record`]. Everything else (ordering, cutoff, dedup,
//! persistence) lives in the crawl engine and is shared by all sources.

mod html;
mod telegram;

pub use html::{HtmlSectionAdapter, DEFAULT_ARTICLE_PATH};
pub use telegram::{normalize_channel, TelegramPreviewAdapter, DEFAULT_TELEGRAM_BASE};

use crate::record::{Candidate, Record};
use crate::storage::normalize;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, Offset, TimeZone};
use scraper::ElementRef;

/// Capability every origin implements
#[async_trait]
pub trait SourceAdapter: Send {
    /// Source name stamped on every record
    fn name(&self) -> &str;

    /// Lists candidates on listing page `page` (1-based)
    ///
    /// Order is not significant; the engine sorts. An empty result means the
    /// adapter has nothing beyond the previous page.
    async fn list_candidates(&mut self, page: u32) -> crate::Result<Vec<Candidate>>;

    /// Timestamp used to order candidates, if one can be read without fetching
    fn extract_timestamp(&self, candidate: &Candidate) -> Option<DateTime<FixedOffset>> {
        candidate.timestamp
    }

    /// Fetches and parses one candidate
    ///
    /// `Ok(None)` means required fields (header or date) were missing. That is a
    /// skip, not an error.
    async fn fetch_and_parse(&mut self, candidate: &Candidate) -> crate::Result<Option<Record>>;

    /// Dedup key for a parsed record; the normalized header by default
    fn dedup_key(&self, record: &Record) -> String {
        normalize(record.header())
    }
}

/// Parses the date formats found in article markup
///
/// Accepts RFC 3339 (`Z` or offset), ISO-8601 with a `+hhmm` offset, and
/// naive date-times or bare dates, which are read as local time.
pub fn parse_datetime(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt);
    }

    for format in ["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%dT%H:%M%z", "%Y-%m-%dT%H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }

    for format in [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return local_to_fixed(naive);
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .and_then(local_to_fixed)
}

fn local_to_fixed(naive: NaiveDateTime) -> Option<DateTime<FixedOffset>> {
    let local = Local.from_local_datetime(&naive).earliest()?;
    let offset = local.offset().fix();
    Some(local.with_timezone(&offset))
}

/// Text content of an element: text nodes trimmed and joined with spaces
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strips leading `#` marks and surrounding whitespace from a tag
pub(crate) fn sanitize_tag(tag: &str) -> String {
    tag.trim().trim_start_matches('#').trim().to_string()
}

/// Splits a comma-separated keyword list
pub(crate) fn split_keywords(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
