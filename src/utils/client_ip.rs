//! Client IP resolution.

use axum::http::HeaderMap;
use std::net::SocketAddr;

/// Header carrying the proxy chain, client first.
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Literal used when no address can be determined.
pub const UNKNOWN_CLIENT_IP: &str = "unknown";

/// Resolves the client IP address for a request.
///
/// Priority:
/// 1. First comma-separated entry of `X-Forwarded-For`, trimmed
/// 2. Transport-layer peer address
/// 3. `"unknown"`
///
/// Empty entries are skipped at each step.
///
/// # Examples
///
/// ```
/// use axum::http::HeaderMap;
/// use telehealth_gateway::utils::resolve_client_ip;
///
/// let mut headers = HeaderMap::new();
/// headers.insert("x-forwarded-for", " 203.0.113.7 , 10.0.0.1".parse().unwrap());
/// assert_eq!(resolve_client_ip(&headers, None), "203.0.113.7");
///
/// assert_eq!(resolve_client_ip(&HeaderMap::new(), None), "unknown");
/// ```
pub fn resolve_client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get(FORWARDED_FOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|chain| chain.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT_IP.to_string())
}
