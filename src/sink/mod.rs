//! Downstream push with backpressure
//!
//! After a record is stored the engine may forward it to a downstream API. The
//! reply decides whether the crawler keeps going: anything other than a
//! positive "created" acknowledgement asks it to pause until the next
//! iteration.

mod http;

pub use http::{HttpSink, PushPayload};

use crate::record::Record;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Acknowledgement returned by the push API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub news_id: Option<i64>,

    #[serde(default)]
    pub cluster_id: Option<i64>,

    /// False when the item was already known downstream
    #[serde(default)]
    pub created: bool,
}

/// Optional consumer of stored records
#[async_trait]
pub trait BackpressureSink: Send {
    /// Pushes one record
    ///
    /// `None` means the push failed or the reply could not be read. Failures
    /// are logged by the sink and never surface as errors.
    async fn push(&mut self, record: &Record) -> Option<Ack>;
}

/// Whether a push result asks the crawler to pause
pub fn should_pause(ack: Option<&Ack>) -> bool {
    !ack.is_some_and(|ack| ack.created)
}
