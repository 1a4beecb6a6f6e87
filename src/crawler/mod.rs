//! Crawler module: fetching, pacing and the ingestion loop
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with bounded retries and backoff
//! - Random pacing between candidate fetches
//! - The cutoff window and the crawl engine state machine
//! - The scheduler that repeats iterations

mod cutoff;
mod engine;
mod fetcher;
mod rate_limit;
mod scheduler;

pub use cutoff::CutoffWindow;
pub use engine::{
    sort_newest_first, CrawlEngine, CrawlIteration, EngineGroup, EngineSettings,
    IterationOutcome, StopReason,
};
pub use fetcher::{build_http_client, AttemptFailure, FetchError, Requester, RetryPolicy};
pub use rate_limit::RateLimiter;
pub use scheduler::{next_sleep, run_forever, run_once, Schedule};

use crate::config::{SourceConfig, SourceKind};
use crate::sink::{BackpressureSink, HttpSink};
use crate::source::{normalize_channel, HtmlSectionAdapter, SourceAdapter, TelegramPreviewAdapter};
use crate::storage::open_store;
use crate::{ConfigError, NewslineError};
use std::time::Duration;

/// Wires adapter, store, sink and pacing for one configured source
///
/// Telegram sources get one engine per channel, run in sequence as a group.
pub fn build_iteration(source: &SourceConfig) -> crate::Result<Box<dyn CrawlIteration>> {
    match source.kind {
        SourceKind::Html => {
            let referer = source.section_url.as_deref().or(source.base_url.as_deref());
            let requester = Requester::from_settings(&source.crawl, referer)?;
            let adapter = HtmlSectionAdapter::from_config(source, requester)?;
            Ok(Box::new(build_engine(source, adapter)?))
        }
        SourceKind::Telegram => {
            let requester = Requester::from_settings(&source.crawl, None)?;

            let mut members: Vec<Box<dyn CrawlIteration>> = Vec::new();
            for raw in &source.channels {
                let Some(channel) = normalize_channel(raw) else {
                    tracing::warn!(source = %source.name, "Skipping invalid channel {:?}", raw);
                    continue;
                };
                let adapter = TelegramPreviewAdapter::new(
                    &source.name,
                    channel,
                    source.base_url.as_deref(),
                    requester.clone(),
                );
                members.push(Box::new(build_engine(source, adapter)?));
            }

            match members.len() {
                0 => Err(ConfigError::Validation(format!(
                    "source '{}' has no usable channels",
                    source.name
                ))
                .into()),
                1 => members.pop().ok_or_else(|| {
                    NewslineError::Source(format!("source '{}' lost its channel", source.name))
                }),
                _ => Ok(Box::new(EngineGroup::new(&source.name, members))),
            }
        }
    }
}

fn build_engine<A: SourceAdapter + 'static>(
    source: &SourceConfig,
    adapter: A,
) -> crate::Result<CrawlEngine<A>> {
    let crawl = &source.crawl;
    let store = open_store(&crawl.data_dir, &source.name, crawl.events_enabled);
    let limiter = RateLimiter::new(crawl.rate_delay_min, crawl.rate_delay_max);

    let mut engine = CrawlEngine::new(adapter, Box::new(store), EngineSettings::from(crawl))
        .with_rate_limiter(limiter);

    if let Some(url) = crawl.sink_url.as_deref() {
        let sink = HttpSink::new(url, Duration::from_secs(crawl.sink_timeout_seconds))?;
        engine = engine.with_sink(Box::new(sink) as Box<dyn BackpressureSink>);
    }

    Ok(engine)
}
