//! Observability and request-governance services.

pub mod authorization;
pub mod identity_service;
pub mod latency_tracker;
pub mod logger;
pub mod rate_limiter;
pub mod tracer;

pub use authorization::{StaticPermissionOracle, require_permission};
pub use identity_service::{IdentityError, IdentityService, VerifiedIdentity};
pub use latency_tracker::{LatencyTracker, LatencyTrackerConfig, QueryClass};
pub use logger::{LogSink, MemorySink, StructuredLogger, TracingSink};
pub use rate_limiter::{KeyStrategy, RateLimitConfig, RateLimitDecision, RateLimiter};
pub use tracer::{SpanGuard, SpanTracer, add_span_event, record_exception, set_span_attribute};
