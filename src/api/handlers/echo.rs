//! Probe endpoints used to check the middleware wiring.

use axum::{Extension, Json};
use serde_json::{Value, json};

use crate::application::services::{StructuredLogger, set_span_attribute};
use crate::domain::RequestContext;
use crate::error::AppError;

/// `GET /ping`: liveness probe, skipped by the general rate limiter.
pub async fn ping_handler() -> Json<Value> {
    Json(json!({ "pong": true }))
}

/// `POST /echo`: returns the JSON body with the request identifiers.
///
/// Logs the body through the request logger, so sensitive fields appear
/// redacted in the log but unchanged in the response.
pub async fn echo_handler(
    Extension(ctx): Extension<RequestContext>,
    Extension(logger): Extension<StructuredLogger>,
    Json(body): Json<Value>,
) -> Json<Value> {
    logger.info("Echo request received", json!({ "body": body }));
    set_span_attribute("echo.user_present", ctx.user_id.is_some());

    Json(json!({
        "requestId": ctx.request_id,
        "correlationId": ctx.correlation_id,
        "userId": ctx.user_id,
        "body": body,
    }))
}

/// Fallback for unknown routes.
pub async fn not_found_handler() -> AppError {
    AppError::not_found("Route not found", Value::Null)
}
