mod common;

use axum::http::{HeaderName, HeaderValue, header};
use chrono::Utc;
use serde_json::{Value, json};
use uuid::Uuid;

#[tokio::test]
async fn test_generates_request_id_when_absent() {
    let app = common::create_test_app();

    let response = app.server.get("/ping").await;

    response.assert_status_ok();
    let request_id = response.headers()["x-request-id"].to_str().unwrap().to_string();
    let correlation_id = response.headers()["x-correlation-id"].to_str().unwrap();
    assert_eq!(Uuid::parse_str(&request_id).unwrap().get_version_num(), 4);
    assert_eq!(correlation_id, request_id);
}

#[tokio::test]
async fn test_inbound_ids_are_echoed() {
    let app = common::create_test_app();

    let response = app
        .server
        .post("/echo")
        .add_header(
            HeaderName::from_static("x-request-id"),
            HeaderValue::from_static("abc-123"),
        )
        .add_header(
            HeaderName::from_static("x-correlation-id"),
            HeaderValue::from_static("checkout-flow-7"),
        )
        .json(&json!({"item": "amoxicillin"}))
        .await;

    response.assert_status_ok();
    assert_eq!(response.headers()["x-request-id"], "abc-123");
    assert_eq!(response.headers()["x-correlation-id"], "checkout-flow-7");

    let body = response.json::<Value>();
    assert_eq!(body["requestId"], "abc-123");
    assert_eq!(body["correlationId"], "checkout-flow-7");
    assert_eq!(body["userId"], Value::Null);
}

#[tokio::test]
async fn test_client_ip_from_forwarded_for() {
    let app = common::create_test_app();

    app.server
        .get("/ping")
        .add_header(
            HeaderName::from_static("x-forwarded-for"),
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        )
        .await;

    let start = app
        .logs
        .records()
        .into_iter()
        .find(|r| r.message == "Incoming request")
        .unwrap();
    assert_eq!(start.context["ip"], "203.0.113.7");
}

#[tokio::test]
async fn test_verified_bearer_sets_user_id() {
    let app = common::create_test_app();
    let token = common::sign_token(
        common::JWT_SECRET,
        json!({"sub": "patient-17", "exp": Utc::now().timestamp() + 300}),
    );

    let response = app
        .server
        .post("/echo")
        .add_header(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        )
        .json(&json!({}))
        .await;

    assert_eq!(response.json::<Value>()["userId"], "patient-17");
}

#[tokio::test]
async fn test_forged_bearer_is_ignored() {
    let app = common::create_test_app();
    let token = common::sign_token("attacker-secret", json!({"sub": "admin"}));

    let response = app
        .server
        .post("/echo")
        .add_header(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        )
        .json(&json!({}))
        .await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["userId"], Value::Null);
}

#[tokio::test]
async fn test_error_envelope_carries_request_id() {
    let app = common::create_test_app();

    let response = app
        .server
        .get("/no-such-route")
        .add_header(
            HeaderName::from_static("x-request-id"),
            HeaderValue::from_static("req-404"),
        )
        .await;

    response.assert_status_not_found();
    let body = response.json::<Value>();
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    assert_eq!(body["error"]["requestId"], "req-404");
    assert_eq!(body["error"]["statusCode"], 404);
    assert_eq!(response.headers()["x-request-id"], "req-404");
}
