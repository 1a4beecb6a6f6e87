//! One ingestion pass over a source
//!
//! The engine walks `Start -> Listing -> Scanning -> (Stopped | Exhausted)`:
//! it loads the dedup index, lists candidate pages until they stop yielding
//! anything new or fresh, orders candidates newest first and scans them until
//! it reaches something stale, something already stored, or a downstream pause.

use crate::config::CrawlSettings;
use crate::crawler::{CutoffWindow, RateLimiter};
use crate::record::{Candidate, IngestEvent};
use crate::sink::{should_pause, BackpressureSink};
use crate::source::SourceAdapter;
use crate::storage::{DedupIndex, Store};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

/// Why a scan ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Reached an item older than the cutoff
    Stale,
    /// Reached an item already in the dedup index
    Duplicate,
    /// The sink asked to back off
    Paused,
    /// Every candidate was scanned
    Done,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::Stale => "stale",
            StopReason::Duplicate => "duplicate",
            StopReason::Paused => "paused",
            StopReason::Done => "done",
        };
        write!(f, "{}", s)
    }
}

/// Result of one iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationOutcome {
    /// Records persisted during this iteration
    pub stored: usize,
    pub stop_reason: StopReason,
    /// Candidates that failed to fetch or parse
    pub errors: usize,
}

impl IterationOutcome {
    fn new(stored: usize, stop_reason: StopReason, errors: usize) -> Self {
        Self {
            stored,
            stop_reason,
            errors,
        }
    }
}

/// The part of the crawl settings the engine itself reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub days_back: u32,
    pub max_pages: u32,
    pub dedup_enabled: bool,
}

impl From<&CrawlSettings> for EngineSettings {
    fn from(settings: &CrawlSettings) -> Self {
        Self {
            days_back: settings.days_back,
            max_pages: settings.max_pages.max(1),
            dedup_enabled: !settings.disable_dedup,
        }
    }
}

/// Something the scheduler can run repeatedly
#[async_trait]
pub trait CrawlIteration: Send {
    /// Name used in logs
    fn label(&self) -> &str;

    async fn run_iteration(&mut self) -> crate::Result<IterationOutcome>;
}

/// Generic crawl engine, parameterized by the source adapter
pub struct CrawlEngine<A: SourceAdapter> {
    adapter: A,
    store: Box<dyn Store + Send>,
    sink: Option<Box<dyn BackpressureSink>>,
    limiter: RateLimiter,
    settings: EngineSettings,
}

impl<A: SourceAdapter> CrawlEngine<A> {
    pub fn new(adapter: A, store: Box<dyn Store + Send>, settings: EngineSettings) -> Self {
        Self {
            adapter,
            store,
            sink: None,
            limiter: RateLimiter::disabled(),
            settings,
        }
    }

    pub fn with_sink(mut self, sink: Box<dyn BackpressureSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    /// Runs one iteration against an explicit cutoff
    pub async fn run_with_cutoff(&mut self, cutoff: CutoffWindow) -> crate::Result<IterationOutcome> {
        let source = self.adapter.name().to_string();
        let mut index = DedupIndex::load(&*self.store)?;
        tracing::info!(
            source = %source,
            keys = index.len(),
            cutoff = %cutoff.cutoff().to_rfc3339(),
            "iteration started"
        );

        let candidates = self.collect_candidates(&cutoff).await?;
        let candidates = self.order_newest_first(candidates);
        tracing::info!(source = %source, candidates = candidates.len(), "listing finished");

        let mut stored = 0;
        let mut errors = 0;

        for candidate in candidates {
            self.limiter.wait().await;

            let record = match self.adapter.fetch_and_parse(&candidate).await {
                Ok(Some(record)) => record,
                Ok(None) => {
                    tracing::warn!(source = %source, url = %candidate.reference, "missing required fields");
                    errors += 1;
                    self.store.append_event(&IngestEvent::error(
                        &source,
                        &candidate.reference,
                        "missing required fields",
                    ))?;
                    continue;
                }
                Err(e) => {
                    tracing::warn!(source = %source, url = %candidate.reference, "Failed to process candidate: {}", e);
                    errors += 1;
                    self.store.append_event(&IngestEvent::error(
                        &source,
                        &candidate.reference,
                        e.to_string(),
                    ))?;
                    continue;
                }
            };

            if cutoff.is_stale(&record.published_at()) {
                tracing::info!(source = %source, url = %candidate.reference, "reached stale item");
                return Ok(self.finish(&source, IterationOutcome::new(stored, StopReason::Stale, errors)));
            }

            let key = self.adapter.dedup_key(&record);
            if self.settings.dedup_enabled && index.contains(&key) {
                tracing::info!(source = %source, url = %candidate.reference, "reached known item");
                self.store.append_event(&IngestEvent::duplicate(record))?;
                return Ok(self.finish(&source, IterationOutcome::new(stored, StopReason::Duplicate, errors)));
            }

            self.store.append_record(&record)?;
            self.store.append_key(&key)?;
            self.store.append_event(&IngestEvent::stored(record.clone()))?;
            index.insert(key);
            stored += 1;
            tracing::debug!(source = %source, url = %candidate.reference, header = %record.header(), "stored");

            if let Some(sink) = self.sink.as_mut() {
                let ack = sink.push(&record).await;
                if should_pause(ack.as_ref()) {
                    tracing::warn!(source = %source, "downstream asked to pause");
                    return Ok(self.finish(&source, IterationOutcome::new(stored, StopReason::Paused, errors)));
                }
            }
        }

        Ok(self.finish(&source, IterationOutcome::new(stored, StopReason::Done, errors)))
    }

    fn finish(&self, source: &str, outcome: IterationOutcome) -> IterationOutcome {
        tracing::info!(
            source = %source,
            stored = outcome.stored,
            errors = outcome.errors,
            reason = %outcome.stop_reason,
            "iteration finished"
        );
        outcome
    }

    /// Lists pages until one adds nothing new or is entirely stale
    async fn collect_candidates(&mut self, cutoff: &CutoffWindow) -> crate::Result<Vec<Candidate>> {
        let mut seen = HashSet::new();
        let mut collected = Vec::new();

        for page in 1..=self.settings.max_pages {
            let batch = match self.adapter.list_candidates(page).await {
                Ok(batch) => batch,
                Err(e) if page == 1 => return Err(e),
                Err(e) => {
                    tracing::warn!(source = %self.adapter.name(), page, "Listing stopped early: {}", e);
                    break;
                }
            };

            let mut fresh = false;
            let mut added = 0;
            for candidate in batch {
                let stale = self
                    .adapter
                    .extract_timestamp(&candidate)
                    .is_some_and(|ts| cutoff.is_stale(&ts));
                fresh |= !stale;

                if seen.insert(candidate.reference.clone()) {
                    collected.push(candidate);
                    added += 1;
                }
            }

            tracing::debug!(source = %self.adapter.name(), page, added, "listing page read");
            if added == 0 || !fresh {
                break;
            }
        }

        Ok(collected)
    }

    fn order_newest_first(&self, candidates: Vec<Candidate>) -> Vec<Candidate> {
        let keyed = candidates
            .into_iter()
            .map(|c| (self.adapter.extract_timestamp(&c), c))
            .collect();
        sort_newest_first(keyed)
    }
}

/// Stable sort by timestamp descending; candidates without one go last
pub fn sort_newest_first(
    mut keyed: Vec<(Option<DateTime<FixedOffset>>, Candidate)>,
) -> Vec<Candidate> {
    keyed.sort_by(|(a, _), (b, _)| match (a, b) {
        (Some(a), Some(b)) => b.cmp(a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    keyed.into_iter().map(|(_, c)| c).collect()
}

#[async_trait]
impl<A: SourceAdapter> CrawlIteration for CrawlEngine<A> {
    fn label(&self) -> &str {
        self.adapter.name()
    }

    async fn run_iteration(&mut self) -> crate::Result<IterationOutcome> {
        let cutoff = CutoffWindow::from_now(self.settings.days_back);
        self.run_with_cutoff(cutoff).await
    }
}

/// Several engines run one after another as a single iteration
///
/// Used for sources that fan out, such as one engine per channel. A member
/// that fails is logged and skipped; the group fails only if every member did.
/// A member that pauses ends the group iteration, later members wait for the
/// next one.
pub struct EngineGroup {
    label: String,
    members: Vec<Box<dyn CrawlIteration>>,
}

impl EngineGroup {
    pub fn new(label: impl Into<String>, members: Vec<Box<dyn CrawlIteration>>) -> Self {
        Self {
            label: label.into(),
            members,
        }
    }
}

#[async_trait]
impl CrawlIteration for EngineGroup {
    fn label(&self) -> &str {
        &self.label
    }

    async fn run_iteration(&mut self) -> crate::Result<IterationOutcome> {
        let mut outcomes = Vec::with_capacity(self.members.len());
        let mut failed = 0;
        let mut last_error = None;

        for member in self.members.iter_mut() {
            match member.run_iteration().await {
                Ok(outcome) => {
                    let paused = outcome.stop_reason == StopReason::Paused;
                    outcomes.push(outcome);
                    if paused {
                        tracing::warn!(group = %self.label, source = %member.label(), "downstream paused, skipping remaining members");
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(source = %member.label(), "Iteration failed: {}", e);
                    failed += 1;
                    last_error = Some(e);
                }
            }
        }

        if outcomes.is_empty() {
            if let Some(e) = last_error {
                return Err(e);
            }
        }

        Ok(combine_outcomes(&outcomes, failed))
    }
}

/// Folds member outcomes: a pause anywhere pauses the group
fn combine_outcomes(outcomes: &[IterationOutcome], failed_members: usize) -> IterationOutcome {
    let stored = outcomes.iter().map(|o| o.stored).sum();
    let errors = outcomes.iter().map(|o| o.errors).sum::<usize>() + failed_members;

    let stop_reason = if outcomes.iter().any(|o| o.stop_reason == StopReason::Paused) {
        StopReason::Paused
    } else {
        outcomes
            .iter()
            .map(|o| o.stop_reason)
            .find(|r| *r != StopReason::Done)
            .unwrap_or(StopReason::Done)
    };

    IterationOutcome::new(stored, stop_reason, errors)
}
