mod common;

use serde_json::Value;
use std::time::Duration;

use telehealth_gateway::application::services::{LatencyTrackerConfig, RateLimitConfig};
use telehealth_gateway::domain::LogLevel;

#[tokio::test]
async fn test_performance_report() {
    let app = common::create_test_app();

    for _ in 0..3 {
        app.server.get("/ping").await.assert_status_ok();
    }

    let response = app.server.get("/performance").await;

    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["sampleCount"], 3);
    assert!(body["latency"]["p99"].as_f64().unwrap() >= body["latency"]["p50"].as_f64().unwrap());
    assert!(body["latency"]["max"].as_f64().unwrap() >= body["latency"]["min"].as_f64().unwrap());
    assert_eq!(body["memory"]["heapUsedMB"], 64);
    assert_eq!(body["memory"]["heapTotalMB"], 128);
    assert_eq!(body["memory"]["externalMB"], 4);
    assert_eq!(body["memory"]["heapUsedPercent"], 50);
    assert_eq!(body["memory"]["rssMB"], 256);
    assert_eq!(body["leak"]["isLeaking"], false);
    assert_eq!(body["leak"]["growthMB"], 0);
}

#[tokio::test]
async fn test_empty_report_is_zeroed() {
    let app = common::create_test_app();

    let body = app.server.get("/performance").await.json::<Value>();

    assert_eq!(body["sampleCount"], 0);
    for key in ["p50", "p95", "p99", "avg", "min", "max"] {
        assert_eq!(body["latency"][key], 0.0, "{key}");
    }
}

#[tokio::test]
async fn test_unmatched_requests_are_sampled() {
    let app = common::create_test_app();

    app.server.get("/nowhere").await.assert_status_not_found();

    assert_eq!(app.state.latency.sample_count(), 1);
}

#[tokio::test]
async fn test_slow_requests_are_logged() {
    let app = common::create_test_app_with(
        RateLimitConfig::general(Duration::from_secs(60), 100),
        LatencyTrackerConfig {
            slow_request_ms: 0.0,
            ..LatencyTrackerConfig::default()
        },
    );

    app.server.get("/ping").await.assert_status_ok();

    let warning = app
        .logs
        .records()
        .into_iter()
        .find(|r| r.message == "Slow request detected")
        .unwrap();
    assert_eq!(warning.level, LogLevel::Warn);
    assert_eq!(warning.context["path"], "/ping");
    assert_eq!(warning.context["thresholdMs"], 0.0);
    assert!(warning.field("requestId").is_some());
}

#[tokio::test]
async fn test_flat_heap_is_not_a_leak() {
    let app = common::create_test_app();

    for _ in 0..12 {
        app.state.latency.check_leak();
    }

    let body = app.server.get("/performance").await.json::<Value>();
    assert_eq!(body["leak"]["isLeaking"], false);
    assert_eq!(body["leak"]["growthPercent"], 0);
}
