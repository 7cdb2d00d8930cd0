//! Counter store trait and error types.

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::RateLimitHit;

/// Errors that can occur during counter operations.
#[derive(Debug, thiserror::Error)]
pub enum CounterStoreError {
    #[error("Counter store connection error: {0}")]
    Connection(String),
    #[error("Counter store operation error: {0}")]
    Operation(String),
}

/// Result type for counter operations.
pub type CounterStoreResult<T> = Result<T, CounterStoreError>;

/// Fixed-window hit counters shared by every rate limiter.
///
/// # Implementations
///
/// - [`crate::infrastructure::counter_store::RedisCounterStore`] - shared across processes
/// - [`crate::infrastructure::counter_store::MemoryCounterStore`] - single process fallback
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically increments `key`.
    ///
    /// The window expiry is set only when the increment creates the key;
    /// later hits in the same window leave it untouched.
    async fn increment(&self, key: &str, window: Duration) -> CounterStoreResult<RateLimitHit>;

    /// Decrements `key` without moving its expiry. Missing keys are ignored.
    async fn decrement(&self, key: &str) -> CounterStoreResult<()>;

    /// Deletes `key`.
    async fn reset_key(&self, key: &str) -> CounterStoreResult<()>;

    /// Current value of `key`, `None` when absent or expired.
    async fn get(&self, key: &str) -> CounterStoreResult<Option<RateLimitHit>>;

    /// Checks if the backend is reachable.
    async fn health_check(&self) -> bool;

    /// Short backend name for logs and health output.
    fn backend(&self) -> &'static str;
}
