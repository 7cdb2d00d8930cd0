//! Fixed-window rate-limit counters.

use chrono::{DateTime, Utc};

/// State of a counter after an increment.
///
/// `reset_time` is fixed when the window opens; later hits in the same
/// window do not move it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitHit {
    pub total_hits: u64,
    pub reset_time: DateTime<Utc>,
}

impl RateLimitHit {
    /// Whole seconds until the window resets, never negative.
    pub fn seconds_until_reset(&self, now: DateTime<Utc>) -> u64 {
        let millis = (self.reset_time - now).num_milliseconds().max(0) as u64;
        millis.div_ceil(1000)
    }
}
