mod common;

use axum::http::header;
use axum_test::TestServer;
use std::sync::Arc;
use std::time::Duration;

use telehealth_gateway::application::services::{RateLimitConfig, RateLimiter};
use telehealth_gateway::infrastructure::metrics::install_recorder;
use telehealth_gateway::routes::build_router;

#[tokio::test]
async fn test_metrics_disabled_without_recorder() {
    let app = common::create_test_app();

    let response = app.server.get("/metrics").await;

    response.assert_status_not_found();
}

#[tokio::test]
async fn test_metrics_scrape() {
    let app = common::create_test_app();
    let handle = install_recorder().unwrap();
    let limiter = Arc::new(RateLimiter::new(
        RateLimitConfig::general(Duration::from_secs(60), 1)
            .with_skip_paths(vec!["/ping".to_string(), "/metrics".to_string()]),
        app.counters.clone(),
        app.state.logger.clone(),
    ));
    let server =
        TestServer::new(build_router(app.state.clone().with_metrics(handle), limiter)).unwrap();

    server.get("/ping").await.assert_status_ok();
    server.get("/performance").await.assert_status_ok();
    server.get("/performance").await;

    let response = server.get("/metrics").await;

    response.assert_status_ok();
    assert!(
        response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain")
    );
    let text = response.text();
    assert!(text.contains(r#"http_requests_total{method="GET",path="/ping",status="200"} 1"#));
    assert!(text.contains("http_request_duration_seconds_bucket"));
    assert!(text.contains(r#"rate_limit_rejections_total{code="RATE_LIMIT_EXCEEDED"} 1"#));
    assert!(text.contains("http_active_requests"));
}
