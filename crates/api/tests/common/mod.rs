//! Common test utilities for integration tests.
//!
//! Tests run the full router against the in-memory store and the mock mail
//! transport, so no database or network is needed.

// Not every integration test uses every helper.
#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request},
    response::Response,
    Router,
};
use chrono::{Duration, Utc};
use domain::models::PlanTier;
use domain::services::{MailTransport, MockMailTransport};
use domain::store::FormStore;
use fake::{faker::internet::en::SafeEmail, Fake};
use form_backend_api::{
    app::{create_app, AppState},
    config::Config,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use persistence::InMemoryFormStore;
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

/// Shared secret configured by [`Config::load_for_test`].
pub const TEST_IDENTITY_SECRET: &str = "test-identity-secret";

/// A router with handles on its store and mailer.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryFormStore>,
    pub mailer: Arc<MockMailTransport>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with(test_config(), MockMailTransport::new())
    }

    pub fn with_config(config: Config) -> Self {
        Self::with(config, MockMailTransport::new())
    }

    pub fn with_mailer(mailer: MockMailTransport) -> Self {
        Self::with(test_config(), mailer)
    }

    pub fn with(config: Config, mailer: MockMailTransport) -> Self {
        let mailer = Arc::new(mailer);
        let transport: Arc<dyn MailTransport> = mailer.clone();
        Self::build(config, transport, mailer)
    }

    /// Sends through `transport`; `mailer` stays empty.
    pub fn with_transport(config: Config, transport: Arc<dyn MailTransport>) -> Self {
        Self::build(config, transport, Arc::new(MockMailTransport::new()))
    }

    fn build(
        config: Config,
        transport: Arc<dyn MailTransport>,
        mailer: Arc<MockMailTransport>,
    ) -> Self {
        let store = Arc::new(InMemoryFormStore::new());
        let dyn_store: Arc<dyn FormStore> = store.clone();
        let state =
            AppState::new(config, dyn_store, transport).expect("Failed to build test state");

        Self {
            router: create_app(state),
            store,
            mailer,
        }
    }

    /// Sends one request through a clone of the router.
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

/// Test configuration: in-memory store, console mail, no rate limit.
pub fn test_config() -> Config {
    Config::load_for_test(&[]).expect("Failed to build test config")
}

/// Signs an identity token the way the identity provider would.
pub fn mint_token(user_id: &str, email: &str) -> String {
    mint_token_expiring(user_id, email, Utc::now() + Duration::hours(1))
}

pub fn mint_token_expiring(user_id: &str, email: &str, exp: chrono::DateTime<Utc>) -> String {
    let claims = json!({
        "sub": user_id,
        "email": email,
        "iat": Utc::now().timestamp(),
        "exp": exp.timestamp(),
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_IDENTITY_SECRET.as_bytes()),
    )
    .unwrap()
}

/// A form owner with a valid token.
pub struct TestOwner {
    pub user_id: String,
    pub email: String,
    pub token: String,
}

impl TestOwner {
    pub fn new() -> Self {
        let user_id = format!("user_{}", Uuid::new_v4().simple());
        let email: String = SafeEmail().fake();
        let token = mint_token(&user_id, &email);
        Self {
            user_id,
            email,
            token,
        }
    }

    /// Provisions the tenant and moves it to `plan`.
    pub async fn on_plan(self, app: &TestApp, plan: PlanTier) -> Self {
        let tenant = app
            .store
            .find_or_create_tenant(&self.user_id, &self.email)
            .await
            .unwrap();
        app.store.set_plan(tenant.id, plan).unwrap();
        self
    }
}

/// Creates a form via the API and returns the response body.
pub async fn create_test_form(app: &TestApp, owner: &TestOwner, name: &str) -> JsonValue {
    let response = app
        .send(json_request_with_auth(
            Method::POST,
            "/api/v1/forms",
            json!({ "name": name }),
            &owner.token,
        ))
        .await;
    assert_eq!(response.status(), 201, "form creation failed");
    parse_response_body(response).await
}

/// Submits to a form without authentication, like an embedded form would.
pub async fn submit(app: &TestApp, form_id: &str, data: JsonValue) -> Response {
    app.send(json_request(
        Method::POST,
        &format!("/api/v1/forms/{}/submissions", form_id),
        data,
    ))
    .await
}

/// Build a JSON request without authentication.
pub fn json_request(method: Method, uri: &str, body: JsonValue) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

/// Build a JSON request with authentication.
pub fn json_request_with_auth(
    method: Method,
    uri: &str,
    body: JsonValue,
    token: &str,
) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

/// Build a GET request with authentication.
pub fn get_request_with_auth(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

/// Build a GET request without authentication.
pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Build a DELETE request with authentication.
pub fn delete_request_with_auth(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

/// Helper to parse JSON response body.
pub async fn parse_response_body(response: Response) -> JsonValue {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap_or(JsonValue::Null)
}
