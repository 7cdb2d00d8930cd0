//! Fixed-window rate limiting over a shared counter store.
//!
//! Every limiter instance is the same primitive: a counter per
//! `{prefix}:{key}` incremented atomically on each request, with the window
//! expiry set by the store on the first hit only. The specialised factories
//! ([`RateLimitConfig::auth`], [`RateLimitConfig::mfa`], ...) only change the
//! quota, window, key strategy and rejection code.
//!
//! When the shared store errors, hits are counted in a process-local
//! [`MemoryCounterStore`] so limits stay enforced per process.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;

use crate::application::services::StructuredLogger;
use crate::domain::{RateLimitHit, RequestContext};
use crate::infrastructure::counter_store::{CounterStore, CounterStoreResult, MemoryCounterStore};
use crate::infrastructure::metrics;
use crate::utils::mask_email;

/// How the client key is derived from a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStrategy {
    /// Resolved client IP.
    ClientIp,
    /// Verified user id, falling back to the client IP for anonymous requests.
    UserId,
    /// `email` field of a JSON body, lowercased, falling back to the client IP.
    BodyEmail,
}

/// Limiter configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: u64,
    /// Namespace for counter keys, e.g. `rl:auth`.
    pub prefix: String,
    pub key_strategy: KeyStrategy,
    /// Exact paths that bypass the limiter.
    pub skip_paths: Vec<String>,
    /// Give the hit back when the response status is below 400.
    pub skip_successful_requests: bool,
    /// Give the hit back when the response status is 400 or above.
    pub skip_failed_requests: bool,
    /// Machine-readable rejection code.
    pub code: String,
    /// Human-readable rejection message.
    pub message: String,
}

fn default_skip_paths() -> Vec<String> {
    vec!["/health".to_string(), "/ping".to_string()]
}

impl RateLimitConfig {
    /// General API quota keyed by client IP.
    pub fn general(window: Duration, max_requests: u64) -> Self {
        Self {
            window,
            max_requests,
            prefix: "rl:general".to_string(),
            key_strategy: KeyStrategy::ClientIp,
            skip_paths: default_skip_paths(),
            skip_successful_requests: false,
            skip_failed_requests: false,
            code: "RATE_LIMIT_EXCEEDED".to_string(),
            message: "Too many requests from this IP, please try again later.".to_string(),
        }
    }

    /// Login attempts: 5 per 15 minutes per IP; successful logins are not counted.
    pub fn auth() -> Self {
        Self {
            prefix: "rl:auth".to_string(),
            skip_successful_requests: true,
            code: "AUTH_RATE_LIMIT_EXCEEDED".to_string(),
            message: "Too many authentication attempts, please try again later.".to_string(),
            ..Self::general(Duration::from_secs(15 * 60), 5)
        }
    }

    /// Password reset requests: 3 per hour per email address.
    pub fn password_reset() -> Self {
        Self {
            prefix: "rl:password-reset".to_string(),
            key_strategy: KeyStrategy::BodyEmail,
            code: "PASSWORD_RESET_RATE_LIMIT_EXCEEDED".to_string(),
            message: "Too many password reset requests, please try again later.".to_string(),
            ..Self::general(Duration::from_secs(60 * 60), 3)
        }
    }

    /// MFA verification attempts: 5 per 15 minutes per user.
    pub fn mfa() -> Self {
        Self {
            prefix: "rl:mfa".to_string(),
            key_strategy: KeyStrategy::UserId,
            skip_successful_requests: true,
            code: "MFA_RATE_LIMIT_EXCEEDED".to_string(),
            message: "Too many verification attempts, please try again later.".to_string(),
            ..Self::general(Duration::from_secs(15 * 60), 5)
        }
    }

    /// File uploads: 20 per hour per user.
    pub fn file_upload() -> Self {
        Self {
            prefix: "rl:upload".to_string(),
            key_strategy: KeyStrategy::UserId,
            code: "UPLOAD_RATE_LIMIT_EXCEEDED".to_string(),
            message: "Upload limit reached, please try again later.".to_string(),
            ..Self::general(Duration::from_secs(60 * 60), 20)
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_key_strategy(mut self, key_strategy: KeyStrategy) -> Self {
        self.key_strategy = key_strategy;
        self
    }

    pub fn with_skip_paths(mut self, skip_paths: Vec<String>) -> Self {
        self.skip_paths = skip_paths;
        self
    }

    /// Seconds a rejected client is told to wait, rounded up.
    pub fn retry_after_secs(&self) -> u64 {
        (self.window.as_millis() as u64).div_ceil(1000)
    }
}

/// Details of a rejected request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitRejection {
    pub code: String,
    pub message: String,
    pub limit: u64,
    pub retry_after_secs: u64,
    pub reset_after_secs: u64,
}

/// Result of [`RateLimiter::check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// `hit` is `None` only when both the shared and the local store failed.
    Allowed {
        hit: Option<RateLimitHit>,
        remaining: u64,
    },
    Rejected(RateLimitRejection),
}

pub struct RateLimiter {
    config: RateLimitConfig,
    store: Arc<dyn CounterStore>,
    fallback: Arc<MemoryCounterStore>,
    logger: StructuredLogger,
}

impl RateLimiter {
    pub fn new(
        config: RateLimitConfig,
        store: Arc<dyn CounterStore>,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            config,
            store,
            fallback: Arc::new(MemoryCounterStore::new()),
            logger,
        }
    }

    /// Local counters used while the shared store is failing.
    pub fn fallback_store(&self) -> Arc<MemoryCounterStore> {
        self.fallback.clone()
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn key_strategy(&self) -> KeyStrategy {
        self.config.key_strategy
    }

    pub fn should_skip(&self, path: &str) -> bool {
        self.config.skip_paths.iter().any(|p| p == path)
    }

    pub fn storage_key(&self, key: &str) -> String {
        format!("{}:{}", self.config.prefix, key)
    }

    /// Logger bound to the request being processed, if any.
    fn request_logger(&self) -> StructuredLogger {
        RequestContext::current()
            .map(|ctx| self.logger.child(&ctx))
            .unwrap_or_else(|| self.logger.clone())
    }

    /// Counts a hit for `key` and decides whether the request may proceed.
    ///
    /// A failing shared store is logged and the hit is counted in the local
    /// fallback store instead. The request is only let through uncounted if
    /// the fallback fails too.
    pub async fn check(&self, key: &str) -> RateLimitDecision {
        let storage_key = self.storage_key(key);
        let logger = self.request_logger();

        let hit = match self.store.increment(&storage_key, self.config.window).await {
            Ok(hit) => hit,
            Err(e) => {
                logger.warn(
                    "Rate limit store unavailable, counting locally",
                    json!({
                        "key": mask_email(&storage_key),
                        "backend": self.store.backend(),
                        "error": e.to_string(),
                    }),
                );
                match self.fallback.increment(&storage_key, self.config.window).await {
                    Ok(hit) => hit,
                    Err(e) => {
                        logger.error(
                            "Local rate limit counter failed, allowing request",
                            json!({ "key": mask_email(&storage_key), "error": e.to_string() }),
                        );
                        return RateLimitDecision::Allowed {
                            hit: None,
                            remaining: self.config.max_requests,
                        };
                    }
                }
            }
        };

        if hit.total_hits > self.config.max_requests {
            logger.warn(
                "Rate limit exceeded",
                json!({
                    "key": mask_email(&storage_key),
                    "hits": hit.total_hits,
                    "limit": self.config.max_requests,
                    "code": self.config.code,
                }),
            );
            metrics::record_rate_limit_rejection(&self.config.code);

            return RateLimitDecision::Rejected(RateLimitRejection {
                code: self.config.code.clone(),
                message: self.config.message.clone(),
                limit: self.config.max_requests,
                retry_after_secs: self.config.retry_after_secs(),
                reset_after_secs: hit.seconds_until_reset(Utc::now()),
            });
        }

        logger.debug(
            "Rate limit hit counted",
            json!({ "key": mask_email(&storage_key), "hits": hit.total_hits }),
        );

        RateLimitDecision::Allowed {
            remaining: self.config.max_requests - hit.total_hits,
            hit: Some(hit),
        }
    }

    /// Gives a counted hit back when the outcome is configured as skipped.
    ///
    /// Returns whether a compensating decrement was issued.
    pub async fn record_outcome(&self, key: &str, status: u16) -> bool {
        let skip = (self.config.skip_successful_requests && status < 400)
            || (self.config.skip_failed_requests && status >= 400);
        if !skip {
            return false;
        }

        let storage_key = self.storage_key(key);
        if let Err(e) = self.store.decrement(&storage_key).await {
            self.request_logger().warn(
                "Failed to decrement rate limit counter, decrementing locally",
                json!({ "key": mask_email(&storage_key), "error": e.to_string() }),
            );
            // the hit was counted locally if the shared store was down
            let _ = self.fallback.decrement(&storage_key).await;
        }
        true
    }

    /// Clears the counter for `key` in the shared and the local store.
    ///
    /// # Errors
    ///
    /// Returns the shared store error; administrative callers report it.
    pub async fn reset_key(&self, key: &str) -> CounterStoreResult<()> {
        let storage_key = self.storage_key(key);
        self.fallback.reset_key(&storage_key).await?;
        self.store.reset_key(&storage_key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::MemorySink;
    use crate::domain::LogLevel;
    use crate::infrastructure::counter_store::{CounterStoreError, MockCounterStore};

    fn test_logger() -> (StructuredLogger, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        (StructuredLogger::new(sink.clone(), vec![]), sink)
    }

    fn with_store(config: RateLimitConfig, store: impl CounterStore + 'static) -> RateLimiter {
        RateLimiter::new(config, Arc::new(store), test_logger().0)
    }

    fn limiter(max: u64) -> RateLimiter {
        with_store(
            RateLimitConfig::general(Duration::from_millis(60_000), max),
            MemoryCounterStore::new(),
        )
    }

    fn failing_store() -> MockCounterStore {
        let mut store = MockCounterStore::new();
        store
            .expect_increment()
            .returning(|_, _| Err(CounterStoreError::Connection("refused".to_string())));
        store
            .expect_decrement()
            .returning(|_| Err(CounterStoreError::Connection("refused".to_string())));
        store.expect_reset_key().returning(|_| Ok(()));
        store.expect_backend().return_const("mock");
        store
    }

    #[tokio::test]
    async fn test_sixth_request_is_rejected() {
        let limiter = limiter(5);

        for i in 0..5 {
            match limiter.check("10.0.0.1").await {
                RateLimitDecision::Allowed { remaining, .. } => assert_eq!(remaining, 4 - i),
                other => panic!("unexpected {other:?}"),
            }
        }

        match limiter.check("10.0.0.1").await {
            RateLimitDecision::Rejected(rejection) => {
                assert_eq!(rejection.code, "RATE_LIMIT_EXCEEDED");
                assert_eq!(rejection.retry_after_secs, 60);
                assert_eq!(rejection.limit, 5);
            }
            other => panic!("unexpected {other:?}"),
        }

        // a different key in the same window is unaffected
        assert!(matches!(
            limiter.check("10.0.0.2").await,
            RateLimitDecision::Allowed { .. }
        ));
    }

    #[tokio::test]
    async fn test_store_failure_counts_locally() {
        let limiter = with_store(
            RateLimitConfig::general(Duration::from_secs(60), 5),
            failing_store(),
        );

        for i in 0..5 {
            match limiter.check("10.0.0.1").await {
                RateLimitDecision::Allowed { hit, remaining } => {
                    assert_eq!(hit.unwrap().total_hits, i + 1);
                    assert_eq!(remaining, 4 - i);
                }
                other => panic!("unexpected {other:?}"),
            }
        }

        assert!(matches!(
            limiter.check("10.0.0.1").await,
            RateLimitDecision::Rejected(_)
        ));
        assert_eq!(limiter.fallback_store().len(), 1);
    }

    #[tokio::test]
    async fn test_store_failure_gives_back_local_hit() {
        let limiter = with_store(RateLimitConfig::auth(), failing_store());

        for _ in 0..10 {
            assert!(matches!(
                limiter.check("1.2.3.4").await,
                RateLimitDecision::Allowed { .. }
            ));
            limiter.record_outcome("1.2.3.4", 200).await;
        }

        limiter.reset_key("1.2.3.4").await.unwrap();
        assert!(limiter.fallback_store().is_empty());
    }

    #[tokio::test]
    async fn test_logs_carry_request_id_and_mask_email() {
        let (logger, sink) = test_logger();
        let limiter = RateLimiter::new(
            RateLimitConfig::password_reset().with_skip_paths(vec![]),
            Arc::new(failing_store()),
            logger,
        );
        let ctx = RequestContext {
            request_id: "req-42".to_string(),
            correlation_id: "corr-42".to_string(),
            client_ip: "10.0.0.1".to_string(),
            user_agent: None,
            user_id: None,
        };

        ctx.scope(async {
            for _ in 0..4 {
                limiter.check("email:pat@example.com").await;
            }
        })
        .await;

        let records = sink.records();
        let warning = records
            .iter()
            .find(|r| r.message == "Rate limit store unavailable, counting locally")
            .unwrap();
        assert_eq!(warning.context["requestId"], "req-42");
        assert_eq!(
            warning.context["key"],
            "rl:password-reset:email:p***@example.com"
        );

        let exceeded = records
            .iter()
            .find(|r| r.message == "Rate limit exceeded")
            .unwrap();
        assert_eq!(exceeded.level, LogLevel::Warn);
        assert_eq!(exceeded.context["requestId"], "req-42");
        assert!(
            records
                .iter()
                .all(|r| !r.context.values().any(|v| v.to_string().contains("pat@")))
        );
    }

    #[tokio::test]
    async fn test_storage_key_uses_prefix() {
        let mut store = MockCounterStore::new();
        store
            .expect_increment()
            .withf(|key, window| key == "rl:auth:10.0.0.9" && *window == Duration::from_secs(900))
            .times(1)
            .returning(|_, _| {
                Ok(RateLimitHit {
                    total_hits: 1,
                    reset_time: Utc::now(),
                })
            });

        let limiter = with_store(RateLimitConfig::auth(), store);
        limiter.check("10.0.0.9").await;
    }

    #[tokio::test]
    async fn test_skip_successful_requests_decrements() {
        let mut store = MockCounterStore::new();
        store
            .expect_decrement()
            .withf(|key| key == "rl:auth:1.2.3.4")
            .times(1)
            .returning(|_| Ok(()));

        let limiter = with_store(RateLimitConfig::auth(), store);

        assert!(limiter.record_outcome("1.2.3.4", 200).await);
        assert!(!limiter.record_outcome("1.2.3.4", 401).await);
    }

    #[tokio::test]
    async fn test_successful_logins_do_not_exhaust_quota() {
        let limiter = with_store(RateLimitConfig::auth(), MemoryCounterStore::new());

        for _ in 0..10 {
            assert!(matches!(
                limiter.check("1.2.3.4").await,
                RateLimitDecision::Allowed { .. }
            ));
            limiter.record_outcome("1.2.3.4", 200).await;
        }
    }

    #[tokio::test]
    async fn test_reset_key_restores_quota() {
        let limiter = limiter(1);

        limiter.check("k").await;
        assert!(matches!(
            limiter.check("k").await,
            RateLimitDecision::Rejected(_)
        ));

        limiter.reset_key("k").await.unwrap();

        assert!(matches!(
            limiter.check("k").await,
            RateLimitDecision::Allowed { .. }
        ));
    }

    #[test]
    fn test_factories_share_primitive() {
        assert_eq!(RateLimitConfig::auth().code, "AUTH_RATE_LIMIT_EXCEEDED");
        assert_eq!(
            RateLimitConfig::password_reset().key_strategy,
            KeyStrategy::BodyEmail
        );
        assert_eq!(RateLimitConfig::mfa().key_strategy, KeyStrategy::UserId);
        assert_eq!(RateLimitConfig::file_upload().max_requests, 20);
        assert_eq!(RateLimitConfig::password_reset().retry_after_secs(), 3600);
    }

    #[test]
    fn test_skip_paths() {
        let limiter = limiter(5);
        assert!(limiter.should_skip("/health"));
        assert!(limiter.should_skip("/ping"));
        assert!(!limiter.should_skip("/api/orders"));
    }
}
