use chrono::{DateTime, Duration, TimeZone, Utc};

/// Time boundary below which items are stale
///
/// Computed once when an iteration starts and kept fixed for its duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CutoffWindow {
    cutoff: DateTime<Utc>,
}

impl CutoffWindow {
    /// `now - lookback_days`
    pub fn from_now(lookback_days: u32) -> Self {
        Self::at(Utc::now(), lookback_days)
    }

    /// `now - lookback_days` for an explicit `now`
    pub fn at(now: DateTime<Utc>, lookback_days: u32) -> Self {
        Self {
            cutoff: now - Duration::days(i64::from(lookback_days)),
        }
    }

    pub fn cutoff(&self) -> DateTime<Utc> {
        self.cutoff
    }

    /// True iff `timestamp` is strictly older than the cutoff
    pub fn is_stale<Tz: TimeZone>(&self, timestamp: &DateTime<Tz>) -> bool {
        timestamp.with_timezone(&Utc) < self.cutoff
    }
}
