//! Application layer services implementing the request-governance logic.
//!
//! Services own the mutable observability state (sample buffers, active span
//! scope, counters) and expose it through a small API consumed by the Axum
//! middleware in [`crate::api::middleware`].
//!
//! # Available Services
//!
//! - [`services::logger::StructuredLogger`] - Redacted, leveled, context-bound logging
//! - [`services::latency_tracker::LatencyTracker`] - Latency percentiles and heap leak heuristics
//! - [`services::tracer::SpanTracer`] - Span lifecycle and ambient active-span scope
//! - [`services::rate_limiter::RateLimiter`] - Fixed-window quotas over a shared counter store
//! - [`services::identity_service::IdentityService`] - HS256 bearer token verification
//! - [`services::authorization::StaticPermissionOracle`] - Role/permission table

pub mod services;
