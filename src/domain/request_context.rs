//! Per-request identifiers and client metadata.
//!
//! A [`RequestContext`] is created once at the start of the middleware chain,
//! stored in the request extensions, and additionally scoped into tokio
//! task-local storage for the lifetime of the downstream future.
//!
//! Tokio task-locals are not inherited by spawned tasks. Use
//! [`RequestContext::scope`] when moving request work onto a new task.

use axum::http::HeaderMap;
use std::future::Future;
use std::net::SocketAddr;
use tokio::task_local;
use uuid::Uuid;

use crate::utils::resolve_client_ip;

/// Inbound / outbound request identifier header.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Inbound / outbound correlation identifier header.
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

task_local! {
    static CURRENT_CONTEXT: RequestContext;
}

/// Immutable per-request context shared by every middleware stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: String,
    pub correlation_id: String,
    pub client_ip: String,
    pub user_agent: Option<String>,
    pub user_id: Option<String>,
}

impl RequestContext {
    /// Derives the context from request headers and the peer address.
    ///
    /// - `request_id` comes from `X-Request-ID`, or a fresh UUID v4
    /// - `correlation_id` comes from `X-Correlation-ID`, or the request id
    /// - `client_ip` follows [`resolve_client_ip`]
    ///
    /// Never fails; every field has a best-effort default.
    pub fn from_headers(
        headers: &HeaderMap,
        peer: Option<SocketAddr>,
        user_id: Option<String>,
    ) -> Self {
        let request_id =
            header_value(headers, REQUEST_ID_HEADER).unwrap_or_else(|| Uuid::new_v4().to_string());
        let correlation_id =
            header_value(headers, CORRELATION_ID_HEADER).unwrap_or_else(|| request_id.clone());
        let user_agent = header_value(headers, axum::http::header::USER_AGENT.as_str());

        Self {
            request_id,
            correlation_id,
            client_ip: resolve_client_ip(headers, peer),
            user_agent,
            user_id,
        }
    }

    /// Returns the context of the request currently being processed, if any.
    pub fn current() -> Option<Self> {
        CURRENT_CONTEXT.try_with(Clone::clone).ok()
    }

    /// Runs `fut` with this context visible through [`RequestContext::current`].
    pub async fn scope<F>(self, fut: F) -> F::Output
    where
        F: Future,
    {
        CURRENT_CONTEXT.scope(self, fut).await
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbound_ids_are_preserved() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, "abc-123".parse().unwrap());
        headers.insert(CORRELATION_ID_HEADER, "flow-9".parse().unwrap());

        let ctx = RequestContext::from_headers(&headers, None, None);

        assert_eq!(ctx.request_id, "abc-123");
        assert_eq!(ctx.correlation_id, "flow-9");
    }

    #[test]
    fn test_generated_request_id_is_uuid_v4() {
        let ctx = RequestContext::from_headers(&HeaderMap::new(), None, None);

        let parsed = Uuid::parse_str(&ctx.request_id).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
    }

    #[test]
    fn test_correlation_defaults_to_request_id() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, "req-1".parse().unwrap());

        let ctx = RequestContext::from_headers(&headers, None, None);

        assert_eq!(ctx.correlation_id, "req-1");
    }

    #[test]
    fn test_user_agent_and_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("user-agent", "Mozilla/5.0".parse().unwrap());
        let peer: SocketAddr = "10.1.2.3:4000".parse().unwrap();

        let ctx = RequestContext::from_headers(&headers, Some(peer), Some("user-7".to_string()));

        assert_eq!(ctx.user_agent.as_deref(), Some("Mozilla/5.0"));
        assert_eq!(ctx.client_ip, "10.1.2.3");
        assert_eq!(ctx.user_id.as_deref(), Some("user-7"));
    }

    #[tokio::test]
    async fn test_current_is_scoped() {
        assert!(RequestContext::current().is_none());

        let ctx = RequestContext::from_headers(&HeaderMap::new(), None, None);
        let expected = ctx.request_id.clone();

        let seen = ctx
            .scope(async { RequestContext::current().map(|c| c.request_id) })
            .await;

        assert_eq!(seen, Some(expected));
        assert!(RequestContext::current().is_none());
    }
}
