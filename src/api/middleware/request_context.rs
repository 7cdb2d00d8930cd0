//! Request context initialization.

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use axum_auth::AuthBearer;
use std::net::SocketAddr;
use tracing::debug;

use crate::application::services::VerifiedIdentity;
use crate::domain::RequestContext;
use crate::domain::request_context::{CORRELATION_ID_HEADER, REQUEST_ID_HEADER};
use crate::state::AppState;

/// Builds the [`RequestContext`] and echoes its identifiers on the response.
///
/// # Flow
///
/// 1. Read `X-Request-ID` / `X-Correlation-ID`, generating ids when absent
/// 2. Resolve the client IP from `X-Forwarded-For` or the peer address
/// 3. Verify an optional `Authorization: Bearer <jwt>` for the user id
/// 4. Store the context (and [`VerifiedIdentity`]) in request extensions
/// 5. Run the rest of the chain with the context in task-local scope
/// 6. Set `X-Request-ID` and `X-Correlation-ID` on the response
///
/// Never rejects a request. An invalid or missing token only means the
/// context has no `user_id`.
pub async fn layer(State(st): State<AppState>, req: Request, next: Next) -> Response {
    let (mut parts, body) = req.into_parts();

    let identity = match AuthBearer::from_request_parts(&mut parts, &()).await {
        Ok(AuthBearer(token)) if st.identity.is_enabled() => st
            .identity
            .verify(&token)
            .inspect_err(|e| debug!("Bearer token ignored: {}", e))
            .ok(),
        _ => None,
    };

    let peer = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let ctx = RequestContext::from_headers(
        &parts.headers,
        peer,
        identity.as_ref().map(|i| i.user_id.clone()),
    );

    parts.extensions.insert(ctx.clone());
    if let Some(identity) = identity {
        parts.extensions.insert::<VerifiedIdentity>(identity);
    }

    let req = Request::from_parts(parts, body);
    let mut response = ctx.clone().scope(next.run(req)).await;

    let headers = response.headers_mut();
    for (name, value) in [
        (REQUEST_ID_HEADER, &ctx.request_id),
        (CORRELATION_ID_HEADER, &ctx.correlation_id),
    ] {
        if let Ok(value) = HeaderValue::from_str(value) {
            headers.insert(HeaderName::from_static(name), value);
        }
    }

    response
}
