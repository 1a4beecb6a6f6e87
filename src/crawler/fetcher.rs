//! HTTP fetcher implementation
//!
//! This module handles all origin requests for the crawler, including:
//! - Building HTTP clients with the configured identification headers
//! - Bounded retries with exponential backoff
//! - Error classification for logging

use crate::config::CrawlSettings;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, REFERER};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// Why a single attempt failed
#[derive(Debug, Error)]
pub enum AttemptFailure {
    /// HTTP 429 or 503
    #[error("throttled with HTTP {0}")]
    Throttled(u16),

    /// Any other non-2xx status
    #[error("HTTP {0}")]
    Status(u16),

    /// Connection, timeout or body decoding error
    #[error("{0}")]
    Network(#[source] reqwest::Error),
}

/// Errors returned by [`Requester`]
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to fetch {url} after {attempts} attempts: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        #[source]
        last: AttemptFailure,
    },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Invalid header value for {name}: {value}")]
    InvalidHeader { name: &'static str, value: String },
}

/// Retry budget and backoff schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per request, including the first (at least 1)
    pub attempts: u32,

    /// Wait after the first failed attempt; doubled after each further failure
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
        }
    }

    /// Wait after failed attempt number `attempt` (1-based): `backoff * 2^(attempt-1)`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.backoff.saturating_mul(1u32 << exponent)
    }
}

/// Origin fetcher with bounded retries
///
/// Every request carries the configured `User-Agent`, `Accept-Language` and
/// `Referer`. Failed attempts (throttling, other statuses, network errors) are
/// retried after [`RetryPolicy::delay_for`]; there is no wait after the last
/// attempt. Waits block this crawler: nothing else runs meanwhile.
#[derive(Debug, Clone)]
pub struct Requester {
    client: Client,
    policy: RetryPolicy,
}

impl Requester {
    /// Builds a requester from crawl settings
    ///
    /// # Arguments
    ///
    /// * `settings` - Crawl settings (headers, timeout, retry budget)
    /// * `default_referer` - Referer used when the settings don't set one
    pub fn from_settings(
        settings: &CrawlSettings,
        default_referer: Option<&str>,
    ) -> Result<Self, FetchError> {
        let referer = settings.referer.as_deref().or(default_referer);
        let client = build_http_client(
            &settings.user_agent,
            &settings.accept_language,
            referer,
            settings.request_timeout(),
        )?;
        let policy = RetryPolicy::new(
            settings.retry_count,
            Duration::try_from_secs_f64(settings.backoff_seconds).unwrap_or(Duration::ZERO),
        );

        Ok(Self { client, policy })
    }

    pub fn with_client(client: Client, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    /// Fetches `url` and returns its decoded body
    ///
    /// The body is decoded with the charset declared by the response, falling
    /// back to UTF-8.
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - Body of the first successful attempt
    /// * `Err(FetchError::Exhausted)` - Every attempt failed; wraps the last failure
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let mut attempt = 1;

        loop {
            let failure = match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        match response.text().await {
                            Ok(body) => {
                                tracing::debug!(url, attempt, bytes = body.len(), "fetched");
                                return Ok(body);
                            }
                            Err(e) => AttemptFailure::Network(e),
                        }
                    } else {
                        classify_status(status)
                    }
                }
                Err(e) => AttemptFailure::Network(e),
            };

            if attempt >= self.policy.attempts {
                tracing::warn!(url, attempt, error = %failure, "giving up");
                return Err(FetchError::Exhausted {
                    url: url.to_string(),
                    attempts: attempt,
                    last: failure,
                });
            }

            let delay = self.policy.delay_for(attempt);
            tracing::warn!(
                url,
                attempt,
                error = %failure,
                "request failed, retrying in {:?}",
                delay
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

fn classify_status(status: StatusCode) -> AttemptFailure {
    match status {
        StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE => {
            AttemptFailure::Throttled(status.as_u16())
        }
        other => AttemptFailure::Status(other.as_u16()),
    }
}

/// Builds an HTTP client that sends the identification headers on every request
///
/// # Arguments
///
/// * `user_agent` - `User-Agent` value
/// * `accept_language` - `Accept-Language` value
/// * `referer` - Optional `Referer` value
/// * `timeout` - Whole-request timeout
pub fn build_http_client(
    user_agent: &str,
    accept_language: &str,
    referer: Option<&str>,
    timeout: Duration,
) -> Result<Client, FetchError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT_LANGUAGE, header_value("Accept-Language", accept_language)?);
    if let Some(referer) = referer {
        headers.insert(REFERER, header_value("Referer", referer)?);
    }

    Client::builder()
        .user_agent(user_agent)
        .default_headers(headers)
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
        .map_err(FetchError::Client)
}

fn header_value(name: &'static str, value: &str) -> Result<HeaderValue, FetchError> {
    HeaderValue::from_str(value).map_err(|_| FetchError::InvalidHeader {
        name,
        value: value.to_string(),
    })
}
