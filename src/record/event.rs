use crate::record::Record;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status column of an event log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Stored,
    Duplicate,
    Error,
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Stored => "stored",
            Self::Duplicate => "duplicate",
            Self::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// What is known about a candidate that failed before becoming a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorItem {
    pub source_name: String,
    pub origin_ref: String,
}

/// Outcome of one candidate, tagged by status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum IngestOutcome {
    Stored {
        item: Record,
    },
    Duplicate {
        item: Record,
    },
    Error {
        item: ErrorItem,
        #[serde(rename = "errorMessage")]
        error_message: String,
    },
}

/// One line of the event log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestEvent {
    pub recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub outcome: IngestOutcome,
}

impl IngestEvent {
    pub fn stored(record: Record) -> Self {
        Self::now(IngestOutcome::Stored { item: record })
    }

    pub fn duplicate(record: Record) -> Self {
        Self::now(IngestOutcome::Duplicate { item: record })
    }

    pub fn error(
        source_name: impl Into<String>,
        origin_ref: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::now(IngestOutcome::Error {
            item: ErrorItem {
                source_name: source_name.into(),
                origin_ref: origin_ref.into(),
            },
            error_message: message.into(),
        })
    }

    fn now(outcome: IngestOutcome) -> Self {
        Self {
            recorded_at: Utc::now(),
            outcome,
        }
    }

    pub fn status(&self) -> EventStatus {
        match self.outcome {
            IngestOutcome::Stored { .. } => EventStatus::Stored,
            IngestOutcome::Duplicate { .. } => EventStatus::Duplicate,
            IngestOutcome::Error { .. } => EventStatus::Error,
        }
    }
}
