//! Request latency monitoring.

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use crate::application::services::StructuredLogger;
use crate::infrastructure::metrics::{self, ActiveRequestGuard};
use crate::state::AppState;

/// Path label for requests that matched no route.
pub const UNMATCHED_PATH_LABEL: &str = "unmatched";

/// Route template used as the `path` metric label.
///
/// Uses the matched route (`/orders/{id}`) rather than the raw path so label
/// cardinality stays bounded.
pub fn path_label(req: &Request) -> String {
    req.extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_PATH_LABEL.to_string())
}

/// Records the request duration once the inner response is produced.
///
/// - Appends a sample to the [`crate::application::services::LatencyTracker`]
/// - Emits `http_requests_total` / `http_request_duration_seconds`
/// - Warns and counts `http_slow_requests_total` over the slow threshold
/// - Counts `http_errors_total` for 5xx responses
/// - Holds `http_active_requests` up while the request is in flight
pub async fn layer(State(st): State<AppState>, req: Request, next: Next) -> Response {
    let _active = ActiveRequestGuard::new();

    let method = req.method().to_string();
    let path = path_label(&req);
    let logger = req
        .extensions()
        .get::<StructuredLogger>()
        .cloned()
        .unwrap_or_else(|| st.logger.clone());

    let started = Instant::now();
    let response = next.run(req).await;
    let status = response.status();

    st.latency
        .observe_request(&logger, &method, &path, status.as_u16(), started.elapsed());

    if status.is_server_error() {
        metrics::record_http_error(&method, &path, status.as_u16());
    }

    response
}
