//! # Telehealth Gateway
//!
//! Request governance and observability middleware for the telehealth/pharmacy
//! platform, built with Axum and Redis.
//!
//! ## Architecture
//!
//! The crate keeps the same layer separation as the rest of the platform:
//!
//! - **Domain Layer** ([`domain`]) - Request context, log records, latency samples,
//!   rate-limit counters and collaborator traits
//! - **Application Layer** ([`application`]) - Structured logging, latency tracking,
//!   span tracing, rate limiting and identity verification
//! - **Infrastructure Layer** ([`infrastructure`]) - Redis / in-memory counter stores,
//!   OpenTelemetry tracer provider, Prometheus metrics, audit sink, memory probe
//! - **API Layer** ([`api`]) - Axum middleware stack and operational handlers
//!
//! ## Middleware Order
//!
//! Every inbound request passes through, in order:
//!
//! 1. [`api::middleware::request_context`] - request / correlation ids, client IP, identity
//! 2. [`api::middleware::logging`] - redacted request start / end logs
//! 3. [`api::middleware::latency`] - duration samples, HTTP metrics, slow request warnings
//! 4. [`api::middleware::tracing`] - one server span per request
//! 5. [`api::middleware::rate_limit`] - fixed-window quota per client key
//! 6. [`api::middleware::audit`] - audit entries for mutating requests
//!
//! ## Quick Start
//!
//! ```bash
//! export REDIS_URL="redis://localhost:6379"  # Optional, falls back to in-process counters
//! export JWT_SECRET="change-me"              # Optional, enables user identity in logs
//!
//! cargo run
//! ```
//!
//! ## Configuration
//!
//! Service configuration is loaded from environment variables via [`config::Config`].
//! See [`config`] module for available options.

pub mod api;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod state;
pub mod utils;

pub mod config;
pub mod server;

pub mod routes;

pub use error::AppError;
pub use state::AppState;

/// Commonly used types for external consumers.
///
/// Re-exports frequently used types to simplify imports for library users
/// and integration tests.
pub mod prelude {
    pub use crate::application::services::{
        LatencyTracker, RateLimitConfig, RateLimiter, SpanTracer, StructuredLogger,
    };
    pub use crate::domain::{LogLevel, RequestContext};
    pub use crate::error::AppError;
    pub use crate::state::AppState;
}
