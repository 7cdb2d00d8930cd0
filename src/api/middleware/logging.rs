//! Request start/end logging.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use crate::domain::RequestContext;
use crate::state::AppState;

/// Logs each request through a child logger bound to its context.
///
/// The child [`crate::application::services::StructuredLogger`] is inserted
/// into request extensions so later stages and handlers log with the same
/// `requestId` / `userId` / `correlationId` bindings.
///
/// # Example Logs
///
/// ```text
/// INFO Incoming request context={"requestId":"3f0c…","method":"GET","path":"/orders",…}
/// WARN Request completed context={"requestId":"3f0c…","statusCode":404,"durationMs":3.1,…}
/// ```
pub async fn layer(State(st): State<AppState>, mut req: Request, next: Next) -> Response {
    let ctx = req
        .extensions()
        .get::<RequestContext>()
        .cloned()
        .unwrap_or_else(|| RequestContext::from_headers(req.headers(), None, None));

    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let logger = st.logger.child(&ctx);

    logger.log_request_start(&ctx, &method, &path);
    req.extensions_mut().insert(logger.clone());

    let started = Instant::now();
    let response = next.run(req).await;

    logger.log_request_end(
        &ctx,
        &method,
        &path,
        response.status().as_u16(),
        started.elapsed().as_secs_f64() * 1000.0,
    );

    response
}
