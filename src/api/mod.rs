//! HTTP layer: middleware stack and operational endpoints.
//!
//! # Modules
//!
//! - [`dto`] - Response bodies for the operational endpoints
//! - [`handlers`] - Health, metrics, performance and probe handlers
//! - [`middleware`] - Request context, logging, latency, tracing, rate limiting, audit

pub mod dto;
pub mod handlers;
pub mod middleware;
