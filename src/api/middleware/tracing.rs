//! One server span per HTTP request.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use opentelemetry::trace::{SpanKind, Status, TraceContextExt};
use opentelemetry::KeyValue;

use crate::application::services::{SpanGuard, SpanTracer};
use crate::domain::RequestContext;
use crate::infrastructure::telemetry::{extract_context, inject_context};
use crate::state::AppState;

fn header_str<'a>(req: &'a Request, name: &str) -> Option<&'a str> {
    req.headers().get(name).and_then(|v| v.to_str().ok())
}

/// Wraps the downstream chain in a `SERVER` span named `"<METHOD> <PATH>"`.
///
/// # Attributes
///
/// `http.method`, `http.url`, `http.target`, `http.host`, `http.scheme`,
/// `http.client_ip`, `http.user_agent`, `request.id`, `correlation.id`,
/// and `http.status_code` once the response is known.
///
/// # Status Mapping
///
/// - **2xx / 3xx**: ok
/// - **4xx**: unset, with `http.client_error = true`
/// - **5xx**: error
///
/// An inbound `traceparent` header continues the caller's trace and the
/// response carries the server span's `traceparent`. The span is the current
/// context while handlers run, and ended exactly once even if the request
/// future is dropped.
pub async fn layer(State(st): State<AppState>, req: Request, next: Next) -> Response {
    let ctx = req.extensions().get::<RequestContext>().cloned();
    let method = req.method().to_string();
    let target = req.uri().path().to_string();
    let host = header_str(&req, header::HOST.as_str()).unwrap_or("").to_string();
    let scheme = header_str(&req, "x-forwarded-proto")
        .or(req.uri().scheme_str())
        .unwrap_or("http")
        .to_string();
    let parent = extract_context(req.headers());

    let mut attributes = vec![
        KeyValue::new("http.method", method.clone()),
        KeyValue::new("http.url", req.uri().to_string()),
        KeyValue::new("http.target", target.clone()),
        KeyValue::new("http.host", host),
        KeyValue::new("http.scheme", scheme),
    ];
    if let Some(ctx) = &ctx {
        attributes.push(KeyValue::new("http.client_ip", ctx.client_ip.clone()));
        if let Some(user_agent) = &ctx.user_agent {
            attributes.push(KeyValue::new("http.user_agent", user_agent.clone()));
        }
        attributes.push(KeyValue::new("request.id", ctx.request_id.clone()));
        attributes.push(KeyValue::new("correlation.id", ctx.correlation_id.clone()));
    }

    let cx = st.tracer.start_span(
        format!("{} {}", method, target),
        SpanKind::Server,
        attributes,
        &parent,
    );
    let guard = SpanGuard::new(cx.clone());

    let mut response = SpanTracer::in_span(cx.clone(), next.run(req)).await;

    let status = response.status();
    let span = cx.span();
    span.set_attribute(KeyValue::new("http.status_code", i64::from(status.as_u16())));
    let span_status = if status.is_server_error() {
        Status::error(format!("HTTP {}", status.as_u16()))
    } else if status.is_client_error() {
        span.set_attribute(KeyValue::new("http.client_error", true));
        Status::Unset
    } else {
        Status::Ok
    };

    inject_context(&cx, response.headers_mut());
    guard.end_with(span_status);
    response
}
