//! Items flowing through a crawl
//!
//! - [`Candidate`]: a reference discovered while listing, not yet fetched
//! - [`Record`]: a fully parsed item, immutable once built
//! - [`IngestEvent`]: one observability line per candidate outcome

mod event;

pub use event::{ErrorItem, EventStatus, IngestEvent, IngestOutcome};

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons a record cannot be built
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("record header is empty")]
    EmptyHeader,

    #[error("record source name is empty")]
    EmptySource,
}

/// A not-yet-parsed item found while listing a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Source-specific reference (article URL, `channel/message-id`)
    pub reference: String,

    /// Timestamp visible at listing time, if the source exposes one
    pub timestamp: Option<DateTime<FixedOffset>>,
}

impl Candidate {
    pub fn new(reference: impl Into<String>, timestamp: Option<DateTime<FixedOffset>>) -> Self {
        Self {
            reference: reference.into(),
            timestamp,
        }
    }
}

/// A parsed, normalized ingested item
///
/// Serialized as one line of the record log:
/// `{"header", "text", "date", "hashtags", "sourceName", "originRef"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRecord", rename_all = "camelCase")]
pub struct Record {
    header: String,
    text: String,
    #[serde(rename = "date")]
    published_at: DateTime<FixedOffset>,
    hashtags: Vec<String>,
    source_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    origin_ref: Option<String>,
}

impl Record {
    /// Builds a record
    ///
    /// The header is trimmed and must not be empty. Hashtags are trimmed, blank
    /// ones dropped and repeats removed, keeping the first occurrence order.
    pub fn new(
        header: impl Into<String>,
        text: impl Into<String>,
        published_at: DateTime<FixedOffset>,
        hashtags: impl IntoIterator<Item = String>,
        source_name: impl Into<String>,
        origin_ref: Option<String>,
    ) -> Result<Self, RecordError> {
        let header = header.into().trim().to_string();
        if header.is_empty() {
            return Err(RecordError::EmptyHeader);
        }

        let source_name = source_name.into();
        if source_name.trim().is_empty() {
            return Err(RecordError::EmptySource);
        }

        let mut tags: Vec<String> = Vec::new();
        for tag in hashtags {
            let tag = tag.trim();
            if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
                tags.push(tag.to_string());
            }
        }

        Ok(Self {
            header,
            text: text.into(),
            published_at,
            hashtags: tags,
            source_name,
            origin_ref,
        })
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn published_at(&self) -> DateTime<FixedOffset> {
        self.published_at
    }

    pub fn hashtags(&self) -> &[String] {
        &self.hashtags
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn origin_ref(&self) -> Option<&str> {
        self.origin_ref.as_deref()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecord {
    header: String,
    #[serde(default)]
    text: String,
    date: DateTime<FixedOffset>,
    #[serde(default)]
    hashtags: Vec<String>,
    source_name: String,
    #[serde(default)]
    origin_ref: Option<String>,
}

impl TryFrom<RawRecord> for Record {
    type Error = RecordError;

    fn try_from(raw: RawRecord) -> Result<Self, Self::Error> {
        Record::new(
            raw.header,
            raw.text,
            raw.date,
            raw.hashtags,
            raw.source_name,
            raw.origin_ref,
        )
    }
}
