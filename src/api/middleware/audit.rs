//! Audit trail for mutating requests.

use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::warn;

use crate::domain::{AuditEntry, RequestContext};
use crate::state::AppState;

fn is_mutating(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// Appends an [`AuditEntry`] for every POST / PUT / PATCH / DELETE.
///
/// The entry is written on a spawned task once the response status is
/// known; store failures are logged and never affect the response.
pub async fn layer(State(st): State<AppState>, req: Request, next: Next) -> Response {
    if !is_mutating(req.method()) {
        return next.run(req).await;
    }

    let ctx = req
        .extensions()
        .get::<RequestContext>()
        .cloned()
        .unwrap_or_else(|| RequestContext::from_headers(req.headers(), None, None));
    let method = req.method().to_string();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    let entry = AuditEntry {
        request_id: ctx.request_id,
        correlation_id: ctx.correlation_id,
        user_id: ctx.user_id,
        method,
        path,
        status_code: response.status().as_u16(),
        client_ip: ctx.client_ip,
        timestamp: Utc::now(),
    };

    let store = st.audit.clone();
    tokio::spawn(async move {
        let request_id = entry.request_id.clone();
        if let Err(e) = store.append(entry).await {
            warn!(request_id = %request_id, "Failed to append audit entry: {}", e);
        }
    });

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutating_methods() {
        assert!(is_mutating(&Method::POST));
        assert!(is_mutating(&Method::DELETE));
        assert!(!is_mutating(&Method::GET));
        assert!(!is_mutating(&Method::OPTIONS));
    }
}
