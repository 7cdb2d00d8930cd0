mod common;

use axum::http::{HeaderName, HeaderValue};
use serde_json::json;

#[tokio::test]
async fn test_mutating_requests_are_audited() {
    let app = common::create_test_app();

    app.server
        .post("/echo")
        .add_header(
            HeaderName::from_static("x-request-id"),
            HeaderValue::from_static("audit-1"),
        )
        .add_header(
            HeaderName::from_static("x-forwarded-for"),
            HeaderValue::from_static("192.0.2.10"),
        )
        .json(&json!({"note": "refill"}))
        .await
        .assert_status_ok();

    let entries = app.audit.wait_for(1).await;
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.request_id, "audit-1");
    assert_eq!(entry.method, "POST");
    assert_eq!(entry.path, "/echo");
    assert_eq!(entry.status_code, 200);
    assert_eq!(entry.client_ip, "192.0.2.10");
    assert_eq!(entry.user_id, None);
}

#[tokio::test]
async fn test_read_requests_are_not_audited() {
    let app = common::create_test_app();

    app.server.get("/ping").await.assert_status_ok();
    app.server.get("/performance").await.assert_status_ok();
    app.server.post("/echo").json(&json!({})).await;

    let entries = app.audit.wait_for(1).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].path, "/echo");
}
