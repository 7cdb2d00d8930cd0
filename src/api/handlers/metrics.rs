//! Prometheus scrape endpoint.

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use serde_json::Value;

use crate::error::AppError;
use crate::state::AppState;

/// Renders all metrics in the Prometheus text format.
///
/// # Endpoint
///
/// `GET /metrics`
///
/// # Errors
///
/// Returns `404 Not Found` when no Prometheus recorder is installed.
pub async fn metrics_handler(State(state): State<AppState>) -> Result<Response, AppError> {
    let handle = state
        .metrics
        .as_ref()
        .ok_or_else(|| AppError::not_found("Metrics are not enabled", Value::Null))?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    )
        .into_response())
}
