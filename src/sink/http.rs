use super::{Ack, BackpressureSink};
use crate::record::Record;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// JSON body sent to the push API
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushPayload<'a> {
    pub title: &'a str,
    pub body: &'a str,
    pub source: &'a str,
    pub hash_tags: &'a [String],
    pub published_at: String,
}

impl<'a> From<&'a Record> for PushPayload<'a> {
    fn from(record: &'a Record) -> Self {
        Self {
            title: record.header(),
            body: record.text(),
            source: record.source_name(),
            hash_tags: record.hashtags(),
            published_at: record.published_at().to_rfc3339(),
        }
    }
}

/// Pushes records to an HTTP endpoint as JSON
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: Client,
    endpoint: String,
}

impl HttpSink {
    /// Creates a sink with its own client and request timeout
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl BackpressureSink for HttpSink {
    async fn push(&mut self, record: &Record) -> Option<Ack> {
        let payload = PushPayload::from(record);

        let response = match self.client.post(&self.endpoint).json(&payload).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(endpoint = %self.endpoint, "Failed to push record: {}", e);
                return None;
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(endpoint = %self.endpoint, "Failed to read push reply: {}", e);
                return None;
            }
        };

        if !status.is_success() {
            tracing::error!(endpoint = %self.endpoint, status = status.as_u16(), "Push rejected: {}", body);
            return None;
        }

        if body.trim().is_empty() {
            tracing::error!(endpoint = %self.endpoint, "Empty reply from push API");
            return None;
        }

        match serde_json::from_str::<Ack>(&body) {
            Ok(ack) => {
                tracing::debug!(news_id = ?ack.news_id, cluster_id = ?ack.cluster_id, created = ack.created, "record pushed");
                Some(ack)
            }
            Err(e) => {
                tracing::error!(endpoint = %self.endpoint, "Invalid push reply {:?}: {}", body, e);
                None
            }
        }
    }
}
