//! Top-level router configuration.
//!
//! # Route Structure
//!
//! - `GET  /health`      - Health check: counter store (public)
//! - `GET  /metrics`     - Prometheus scrape
//! - `GET  /performance` - Latency percentiles, memory, leak signal
//! - `GET  /ping`        - Liveness probe
//! - `POST /echo`        - Wiring probe, echoes the JSON body
//!
//! # Middleware
//!
//! Outermost first: request context → logging → latency → tracing →
//! rate limiting → audit. Unknown routes fall back to a `404` error envelope
//! and still pass through the whole stack.

use crate::api::handlers::{
    echo_handler, health_handler, metrics_handler, not_found_handler, performance_handler,
    ping_handler,
};
use crate::api::middleware::{audit, latency, logging, rate_limit, request_context, tracing};
use crate::application::services::RateLimiter;
use crate::state::AppState;
use axum::routing::{get, post};
use axum::{Router, middleware};
use std::sync::Arc;
use tower::Layer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};

/// Constructs the router with all routes and middleware.
///
/// `Router::layer` wraps the last added layer outermost, so the stages are
/// registered innermost first.
///
/// # Arguments
///
/// - `state` - shared application state injected into all handlers
/// - `limiter` - the gateway-wide rate limiter
pub fn build_router(state: AppState, limiter: Arc<RateLimiter>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/performance", get(performance_handler))
        .route("/ping", get(ping_handler))
        .route("/echo", post(echo_handler))
        .fallback(not_found_handler)
        .layer(middleware::from_fn_with_state(state.clone(), audit::layer))
        .layer(middleware::from_fn_with_state(limiter, rate_limit::layer))
        .layer(middleware::from_fn_with_state(state.clone(), tracing::layer))
        .layer(middleware::from_fn_with_state(state.clone(), latency::layer))
        .layer(middleware::from_fn_with_state(state.clone(), logging::layer))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            request_context::layer,
        ))
        .with_state(state)
}

/// [`build_router`] with trailing slashes trimmed before routing.
pub fn app_router(state: AppState, limiter: Arc<RateLimiter>) -> NormalizePath<Router> {
    NormalizePathLayer::trim_trailing_slash().layer(build_router(state, limiter))
}
