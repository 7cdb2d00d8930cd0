//! Redis-backed counter store.

use super::service::{CounterStore, CounterStoreError, CounterStoreResult};
use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use redis::{AsyncCommands, Client, Script, aio::ConnectionManager};
use std::time::Duration;
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, info, warn};

use crate::domain::RateLimitHit;

/// Increments the counter and sets the expiry only when the key was created.
/// A key left without a TTL is healed by setting the window again.
const INCREMENT_SCRIPT: &str = r#"
local hits = redis.call('INCR', KEYS[1])
local ttl = redis.call('PTTL', KEYS[1])
if hits == 1 or ttl < 0 then
  redis.call('PEXPIRE', KEYS[1], ARGV[1])
  ttl = tonumber(ARGV[1])
end
return {hits, ttl}
"#;

/// Decrements a positive counter; never creates a key or goes below zero.
const DECREMENT_SCRIPT: &str = r#"
local hits = tonumber(redis.call('GET', KEYS[1]))
if hits and hits > 0 then
  return redis.call('DECR', KEYS[1])
end
return 0
"#;

const CONNECT_ATTEMPTS: usize = 3;

/// Fixed-window counters shared by every gateway process.
pub struct RedisCounterStore {
    client: ConnectionManager,
    increment_script: Script,
    decrement_script: Script,
}

impl RedisCounterStore {
    /// Connects to Redis and validates the connection with a PING.
    ///
    /// Connection attempts are retried with jittered exponential backoff.
    ///
    /// # Errors
    ///
    /// Returns [`CounterStoreError::Connection`] if the URL is invalid or
    /// every attempt fails.
    pub async fn connect(redis_url: &str) -> CounterStoreResult<Self> {
        info!("Connecting to Redis counter store");

        let client = Client::open(redis_url).map_err(|e| {
            CounterStoreError::Connection(format!("Failed to create Redis client: {}", e))
        })?;

        let strategy = ExponentialBackoff::from_millis(100)
            .max_delay(Duration::from_secs(1))
            .map(jitter)
            .take(CONNECT_ATTEMPTS - 1);

        let manager = Retry::spawn(strategy, || {
            let client = client.clone();
            async move {
                let mut manager = ConnectionManager::new(client).await.inspect_err(|e| {
                    warn!("Redis connection attempt failed: {}", e);
                })?;
                manager.ping::<()>().await?;
                Ok::<_, redis::RedisError>(manager)
            }
        })
        .await
        .map_err(|e| CounterStoreError::Connection(format!("Failed to connect to Redis: {}", e)))?;

        info!("✓ Connected to Redis counter store");

        Ok(Self {
            client: manager,
            increment_script: Script::new(INCREMENT_SCRIPT),
            decrement_script: Script::new(DECREMENT_SCRIPT),
        })
    }
}

fn op_error(action: &str, key: &str, e: redis::RedisError) -> CounterStoreError {
    CounterStoreError::Operation(format!("{} failed for {}: {}", action, key, e))
}

fn hit_from(hits: u64, ttl_ms: i64) -> RateLimitHit {
    RateLimitHit {
        total_hits: hits,
        reset_time: Utc::now() + TimeDelta::milliseconds(ttl_ms.max(0)),
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn increment(&self, key: &str, window: Duration) -> CounterStoreResult<RateLimitHit> {
        let mut conn = self.client.clone();
        let window_ms = window.as_millis() as u64;

        let (hits, ttl_ms): (u64, i64) = self
            .increment_script
            .key(key)
            .arg(window_ms)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| op_error("INCR", key, e))?;

        debug!("Counter INCR: {} -> {} (PTTL: {}ms)", key, hits, ttl_ms);

        Ok(hit_from(hits, ttl_ms))
    }

    async fn decrement(&self, key: &str) -> CounterStoreResult<()> {
        let mut conn = self.client.clone();

        self.decrement_script
            .key(key)
            .invoke_async::<i64>(&mut conn)
            .await
            .map(|_| ())
            .map_err(|e| op_error("DECR", key, e))
    }

    async fn reset_key(&self, key: &str) -> CounterStoreResult<()> {
        let mut conn = self.client.clone();

        conn.del::<_, ()>(key)
            .await
            .map_err(|e| op_error("DEL", key, e))
    }

    async fn get(&self, key: &str) -> CounterStoreResult<Option<RateLimitHit>> {
        let mut conn = self.client.clone();

        let (hits, ttl_ms): (Option<u64>, i64) = redis::pipe()
            .cmd("GET")
            .arg(key)
            .cmd("PTTL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| op_error("GET", key, e))?;

        Ok(hits.map(|hits| hit_from(hits, ttl_ms)))
    }

    async fn health_check(&self) -> bool {
        let mut conn = self.client.clone();
        conn.ping::<()>().await.is_ok()
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
