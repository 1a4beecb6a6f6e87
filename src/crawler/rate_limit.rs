use rand::Rng;
use std::time::Duration;

/// Random pause between candidate fetches
///
/// Keeps request spacing irregular so origins don't throttle us. This is not a
/// correctness mechanism; a zero range disables it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimiter {
    min_secs: f64,
    max_secs: f64,
}

impl RateLimiter {
    /// Creates a limiter drawing uniformly from `[min_secs, max_secs]`
    ///
    /// Bounds are clamped to be non-negative and swapped if reversed.
    /// Non-finite bounds count as zero.
    pub fn new(min_secs: f64, max_secs: f64) -> Self {
        let clamp = |secs: f64| if secs.is_finite() { secs.max(0.0) } else { 0.0 };
        let min_secs = clamp(min_secs);
        let max_secs = clamp(max_secs);
        if min_secs <= max_secs {
            Self { min_secs, max_secs }
        } else {
            Self {
                min_secs: max_secs,
                max_secs: min_secs,
            }
        }
    }

    pub fn disabled() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Picks the next delay
    pub fn next_delay(&self) -> Duration {
        if self.max_secs <= 0.0 {
            return Duration::ZERO;
        }
        let secs = rand::rng().random_range(self.min_secs..=self.max_secs);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
    }

    /// Sleeps for a freshly picked delay
    pub async fn wait(&self) {
        let delay = self.next_delay();
        if !delay.is_zero() {
            tracing::trace!("rate limit sleep {:?}", delay);
            tokio::time::sleep(delay).await;
        }
    }
}
