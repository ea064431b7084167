//! Integration tests for health probes, metrics, response headers and
//! rate limiting of the public submission endpoint.

mod common;

use axum::http::StatusCode;
use common::{create_test_form, get_request, parse_response_body, submit, TestApp, TestOwner};
use form_backend_api::config::Config;
use form_backend_api::middleware::{init_metrics, REQUEST_ID_HEADER};
use serde_json::json;

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new();

    let response = app.send(get_request("/api/health")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"]["backend"], "memory");
    assert_eq!(body["store"]["connected"], true);
}

#[tokio::test]
async fn test_liveness_and_readiness() {
    let app = TestApp::new();

    let live = app.send(get_request("/api/health/live")).await;
    assert_eq!(live.status(), StatusCode::OK);
    assert_eq!(parse_response_body(live).await["status"], "alive");

    let ready = app.send(get_request("/api/health/ready")).await;
    assert_eq!(ready.status(), StatusCode::OK);
    assert_eq!(parse_response_body(ready).await["status"], "ready");
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_business_counters() {
    init_metrics().unwrap();
    let app = TestApp::new();
    let owner = TestOwner::new();
    let form = create_test_form(&app, &owner, "Contact").await;
    submit(&app, form["id"].as_str().unwrap(), json!({ "a": 1 })).await;

    let response = app.send(get_request("/metrics")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8_lossy(&body);
    assert!(text.contains("submissions_received_total"));
    assert!(text.contains("http_requests_total"));
}

#[tokio::test]
async fn test_security_and_request_id_headers() {
    let app = TestApp::new();

    let response = app.send(get_request("/api/health/live")).await;

    let headers = response.headers();
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert!(headers.get("strict-transport-security").is_none());
    assert!(headers.contains_key(REQUEST_ID_HEADER));
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = TestApp::new();
    let request = axum::http::Request::builder()
        .uri("/api/health/live")
        .header(REQUEST_ID_HEADER, "req-123")
        .body(axum::body::Body::empty())
        .unwrap();

    let response = app.send(request).await;

    assert_eq!(response.headers()[REQUEST_ID_HEADER], "req-123");
}

#[tokio::test]
async fn test_hsts_when_enabled() {
    let config = Config::load_for_test(&[("security.hsts_enabled", "true")]).unwrap();
    let app = TestApp::with_config(config);

    let response = app.send(get_request("/api/health/live")).await;

    assert!(response.headers().contains_key("strict-transport-security"));
}

#[tokio::test]
async fn test_submit_rate_limit() {
    let config =
        Config::load_for_test(&[("security.submit_rate_limit_per_minute", "2")]).unwrap();
    let app = TestApp::with_config(config);
    let owner = TestOwner::new();
    let form = create_test_form(&app, &owner, "Contact").await;
    let form_id = form["id"].as_str().unwrap();

    for i in 0..2 {
        let response = submit(&app, form_id, json!({ "i": i })).await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }
    let response = submit(&app, form_id, json!({ "i": 2 })).await;

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key("retry-after"));
    let body = parse_response_body(response).await;
    assert_eq!(body["code"], "rate_limited");
    assert_eq!(app.store.row_counts().unwrap().submissions, 2);
}

fn submit_from(form_id: &str, forwarded_for: &str) -> axum::http::Request<axum::body::Body> {
    axum::http::Request::builder()
        .method("POST")
        .uri(format!("/api/v1/forms/{}/submissions", form_id))
        .header("content-type", "application/json")
        .header("x-forwarded-for", forwarded_for)
        .body(axum::body::Body::from(json!({ "a": 1 }).to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_rotating_forwarded_for_does_not_bypass_rate_limit() {
    let config =
        Config::load_for_test(&[("security.submit_rate_limit_per_minute", "2")]).unwrap();
    let app = TestApp::with_config(config);
    let owner = TestOwner::new();
    let form = create_test_form(&app, &owner, "Contact").await;
    let form_id = form["id"].as_str().unwrap();

    let mut statuses = Vec::new();
    for i in 0..5 {
        let response = app
            .send(submit_from(form_id, &format!("198.51.100.{}", i)))
            .await;
        statuses.push(response.status());
    }

    assert_eq!(
        statuses.iter().filter(|s| **s == StatusCode::CREATED).count(),
        2
    );
    assert_eq!(app.store.row_counts().unwrap().submissions, 2);
}

#[tokio::test]
async fn test_trusted_proxy_limits_per_forwarded_client() {
    let config = Config::load_for_test(&[
        ("security.submit_rate_limit_per_minute", "1"),
        ("security.trust_proxy_headers", "true"),
    ])
    .unwrap();
    let app = TestApp::with_config(config);
    let owner = TestOwner::new();
    let form = create_test_form(&app, &owner, "Contact").await;
    let form_id = form["id"].as_str().unwrap();

    let first = app.send(submit_from(form_id, "198.51.100.1")).await;
    let other_client = app.send(submit_from(form_id, "198.51.100.2")).await;
    let repeat = app.send(submit_from(form_id, "198.51.100.1")).await;

    assert_eq!(first.status(), StatusCode::CREATED);
    assert_eq!(other_client.status(), StatusCode::CREATED);
    assert_eq!(repeat.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_rate_limit_does_not_apply_to_owner_routes() {
    let config =
        Config::load_for_test(&[("security.submit_rate_limit_per_minute", "1")]).unwrap();
    let app = TestApp::with_config(config);
    let owner = TestOwner::new();

    for name in ["One", "Two", "Three"] {
        create_test_form(&app, &owner, name).await;
    }
}
