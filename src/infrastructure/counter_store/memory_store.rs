//! In-process counter store.

use super::service::{CounterStore, CounterStoreError, CounterStoreResult};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use std::time::Duration;
use tracing::debug;

use crate::domain::RateLimitHit;

#[derive(Debug, Clone, Copy)]
struct Window {
    hits: u64,
    reset_time: DateTime<Utc>,
}

impl Window {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.reset_time <= now
    }
}

/// Fixed-window counters held in a concurrent map.
///
/// Limits are only enforced per process. Expired windows are replaced on the
/// next hit; [`MemoryCounterStore::purge_expired`] reclaims keys that are
/// never hit again.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    windows: DashMap<String, Window>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        debug!("Using in-memory counter store");
        Self::default()
    }

    /// Removes expired windows and returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.windows.len();
        self.windows.retain(|_, w| !w.is_expired(now));
        before - self.windows.len()
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment(&self, key: &str, window: Duration) -> CounterStoreResult<RateLimitHit> {
        let window = TimeDelta::from_std(window)
            .map_err(|e| CounterStoreError::Operation(format!("Invalid window: {}", e)))?;
        let now = Utc::now();

        let mut entry = self.windows.entry(key.to_string()).or_insert(Window {
            hits: 0,
            reset_time: now + window,
        });

        if entry.is_expired(now) {
            entry.hits = 0;
            entry.reset_time = now + window;
        }
        entry.hits += 1;

        Ok(RateLimitHit {
            total_hits: entry.hits,
            reset_time: entry.reset_time,
        })
    }

    async fn decrement(&self, key: &str) -> CounterStoreResult<()> {
        if let Some(mut entry) = self.windows.get_mut(key)
            && !entry.is_expired(Utc::now())
        {
            entry.hits = entry.hits.saturating_sub(1);
        }
        Ok(())
    }

    async fn reset_key(&self, key: &str) -> CounterStoreResult<()> {
        self.windows.remove(key);
        Ok(())
    }

    async fn get(&self, key: &str) -> CounterStoreResult<Option<RateLimitHit>> {
        let now = Utc::now();
        Ok(self
            .windows
            .get(key)
            .filter(|w| !w.is_expired(now))
            .map(|w| RateLimitHit {
                total_hits: w.hits,
                reset_time: w.reset_time,
            }))
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
