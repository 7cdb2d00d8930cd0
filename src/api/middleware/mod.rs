//! HTTP middleware for request governance and observability.
//!
//! Registered in this order (outermost first):
//!
//! 1. [`request_context`] - ids, client IP, verified identity
//! 2. [`logging`] - request start / end logs
//! 3. [`latency`] - duration samples and HTTP metrics
//! 4. [`tracing`] - server span per request
//! 5. [`rate_limit`] - fixed-window quota
//!
//! [`audit`] runs innermost so it sees the final status.

pub mod audit;
pub mod latency;
pub mod logging;
pub mod rate_limit;
pub mod request_context;
pub mod tracing;
