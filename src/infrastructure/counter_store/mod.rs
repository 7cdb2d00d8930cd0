//! Rate-limit counter storage.
//!
//! Provides a [`CounterStore`] trait with two implementations:
//! - [`RedisCounterStore`] - Production Redis-backed counters
//! - [`MemoryCounterStore`] - In-process fallback when Redis is unreachable

mod memory_store;
mod redis_store;
mod service;

use std::sync::Arc;
use tracing::warn;

pub use memory_store::MemoryCounterStore;
pub use redis_store::RedisCounterStore;
#[cfg(test)]
pub use service::MockCounterStore;
pub use service::{CounterStore, CounterStoreError, CounterStoreResult};

/// Connects to Redis, falling back to [`MemoryCounterStore`] on failure.
///
/// The fallback keeps limits per process only, so it is logged at `warn`.
/// Returns the memory store handle as well so the caller can schedule
/// purging of expired windows.
pub async fn connect_or_fallback(
    redis_url: &str,
) -> (Arc<dyn CounterStore>, Option<Arc<MemoryCounterStore>>) {
    match RedisCounterStore::connect(redis_url).await {
        Ok(store) => (Arc::new(store), None),
        Err(e) => {
            warn!(
                "Redis unavailable ({}), rate limits fall back to in-memory counters",
                e
            );
            let memory = Arc::new(MemoryCounterStore::new());
            (memory.clone(), Some(memory))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_redis_falls_back_to_memory() {
        let (store, memory) = connect_or_fallback("redis://127.0.0.1:1").await;

        assert_eq!(store.backend(), "memory");
        let memory = memory.expect("fallback handle");
        store
            .increment("rl:general:10.0.0.1", std::time::Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(memory.len(), 1);
    }
}
