//! Repeats crawl iterations on a fixed interval
//!
//! After each iteration the scheduler sleeps for the poll interval, or for the
//! shorter pause interval when the downstream asked to back off. Shutdown is
//! only observed while sleeping, so an iteration in flight always finishes.

use crate::config::CrawlSettings;
use crate::crawler::{CrawlIteration, IterationOutcome, StopReason};
use crate::shutdown;
use std::time::Duration;
use tokio::sync::watch;

/// Sleep lengths between iterations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub poll_interval: Duration,
    pub pause_interval: Duration,
}

impl From<&CrawlSettings> for Schedule {
    fn from(settings: &CrawlSettings) -> Self {
        Self {
            poll_interval: settings.poll_interval(),
            pause_interval: settings.pause_interval(),
        }
    }
}

/// Sleep after an iteration; `None` stands for a failed iteration
pub fn next_sleep(outcome: Option<&IterationOutcome>, schedule: &Schedule) -> Duration {
    match outcome {
        Some(outcome) if outcome.stop_reason == StopReason::Paused => schedule.pause_interval,
        _ => schedule.poll_interval,
    }
}

/// Runs a single iteration
pub async fn run_once<I: CrawlIteration + ?Sized>(iteration: &mut I) -> crate::Result<IterationOutcome> {
    iteration.run_iteration().await
}

/// Runs iterations until shutdown is requested
///
/// Iteration errors are logged and followed by the normal poll interval.
/// Returns the number of iterations run.
pub async fn run_forever<I: CrawlIteration + ?Sized>(
    iteration: &mut I,
    schedule: Schedule,
    mut shutdown_rx: watch::Receiver<bool>,
) -> usize {
    let mut runs = 0;

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let outcome = match iteration.run_iteration().await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                tracing::error!(source = %iteration.label(), "Iteration failed: {}", e);
                None
            }
        };
        runs += 1;

        let sleep = next_sleep(outcome.as_ref(), &schedule);
        tracing::info!(
            source = %iteration.label(),
            stored = outcome.map_or(0, |o| o.stored),
            "next iteration in {}s",
            sleep.as_secs()
        );

        tokio::select! {
            _ = tokio::time::sleep(sleep) => {}
            _ = shutdown::requested(&mut shutdown_rx) => break,
        }
    }

    tracing::info!(source = %iteration.label(), runs, "scheduler stopped");
    runs
}
