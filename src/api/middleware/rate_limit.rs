//! Fixed-window rate limiting middleware.

use axum::{
    Json,
    body::{Body, to_bytes},
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Serialize;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::application::services::rate_limiter::RateLimitRejection;
use crate::application::services::{KeyStrategy, RateLimitDecision, RateLimiter};
use crate::domain::RequestContext;
use crate::error::AppError;
use crate::utils::resolve_client_ip;

/// Largest body buffered to read an `email` key.
pub const MAX_KEY_BODY_BYTES: usize = 64 * 1024;

const RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
const RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
const RATE_LIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RejectionBody {
    error: &'static str,
    message: String,
    code: String,
    retry_after: String,
}

fn set_header(headers: &mut HeaderMap, name: HeaderName, value: u64) {
    headers.insert(name, HeaderValue::from(value));
}

impl IntoResponse for RateLimitRejection {
    fn into_response(self) -> Response {
        let body = RejectionBody {
            error: "Too Many Requests",
            message: self.message,
            code: self.code,
            retry_after: format!("{} seconds", self.retry_after_secs),
        };

        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
        let headers = response.headers_mut();
        set_header(headers, header::RETRY_AFTER, self.retry_after_secs);
        set_header(headers, RATE_LIMIT_LIMIT, self.limit);
        set_header(headers, RATE_LIMIT_REMAINING, 0);
        set_header(headers, RATE_LIMIT_RESET, self.reset_after_secs);
        response
    }
}

/// Enforces a [`RateLimiter`] on every request not in its skip list.
///
/// # Key Extraction
///
/// - [`KeyStrategy::ClientIp`] - the resolved client IP
/// - [`KeyStrategy::UserId`] - `user:<id>` for verified users, else the client IP
/// - [`KeyStrategy::BodyEmail`] - `email:<address>` from a JSON body (buffered up
///   to [`MAX_KEY_BODY_BYTES`] and re-attached), else the client IP
///
/// # Responses
///
/// Allowed responses carry `RateLimit-Limit`, `RateLimit-Remaining` and
/// `RateLimit-Reset`. Rejected requests get `429 Too Many Requests`:
///
/// ```json
/// {
///   "error": "Too Many Requests",
///   "message": "Too many requests from this IP, please try again later.",
///   "code": "RATE_LIMIT_EXCEEDED",
///   "retryAfter": "900 seconds"
/// }
/// ```
///
/// Counter store failures are counted in the limiter's local fallback store.
///
/// # Example
///
/// ```rust,ignore
/// let limiter = Arc::new(RateLimiter::new(RateLimitConfig::auth(), store, logger));
/// let login = Router::new()
///     .route("/auth/login", post(login_handler))
///     .layer(middleware::from_fn_with_state(limiter, rate_limit::layer));
/// ```
pub async fn layer(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if limiter.should_skip(req.uri().path()) {
        return Ok(next.run(req).await);
    }

    let (key, req) = client_key(&limiter, req).await?;

    match limiter.check(&key).await {
        RateLimitDecision::Rejected(rejection) => Ok(rejection.into_response()),
        RateLimitDecision::Allowed { hit, remaining } => {
            let mut response = next.run(req).await;

            if let Some(hit) = hit {
                let headers = response.headers_mut();
                set_header(headers, RATE_LIMIT_LIMIT, limiter.config().max_requests);
                set_header(headers, RATE_LIMIT_REMAINING, remaining);
                set_header(headers, RATE_LIMIT_RESET, hit.seconds_until_reset(Utc::now()));
            }

            limiter
                .record_outcome(&key, response.status().as_u16())
                .await;

            Ok(response)
        }
    }
}

async fn client_key(limiter: &RateLimiter, req: Request) -> Result<(String, Request), AppError> {
    let ctx = req.extensions().get::<RequestContext>().cloned();
    let client_ip = match &ctx {
        Some(ctx) => ctx.client_ip.clone(),
        None => {
            let peer = req
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr);
            resolve_client_ip(req.headers(), peer)
        }
    };

    match limiter.key_strategy() {
        KeyStrategy::ClientIp => Ok((client_ip, req)),
        KeyStrategy::UserId => {
            let key = ctx
                .and_then(|ctx| ctx.user_id)
                .map(|id| format!("user:{}", id))
                .unwrap_or(client_ip);
            Ok((key, req))
        }
        KeyStrategy::BodyEmail => {
            let (email, req) = body_email(req).await?;
            let key = email
                .map(|email| format!("email:{}", email))
                .unwrap_or(client_ip);
            Ok((key, req))
        }
    }
}

/// Reads `email` from a JSON body and puts the body back on the request.
async fn body_email(req: Request) -> Result<(Option<String>, Request), AppError> {
    let (parts, body) = req.into_parts();

    let bytes = to_bytes(body, MAX_KEY_BODY_BYTES).await.map_err(|_| {
        AppError::bad_request(
            "Request body too large",
            json!({"maxBytes": MAX_KEY_BODY_BYTES}),
        )
    })?;

    let email = serde_json::from_slice::<Value>(&bytes)
        .ok()
        .and_then(|v| v.get("email")?.as_str().map(|s| s.trim().to_lowercase()))
        .filter(|s| !s.is_empty());

    Ok((email, Request::from_parts(parts, Body::from(bytes))))
}
