//! Integration tests for the Attireburg back-office API.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p attireburg-integration-tests
//! ```
//!
//! Tests drive the real axum router with `tower::ServiceExt::oneshot` over the
//! in-process store and a recording mailer, so no database or SMTP relay is
//! needed.
//!
//! # Test Categories
//!
//! - `restock` - Restock dates and the storefront hint
//! - `waitlist` - Subscriptions and unsubscribe links
//! - `backorders` - Backorder lifecycle and FIFO fulfillment
//! - `orders` - Checkout and the status state machine
//! - `notifications` - Waitlist fan-out, analytics and admin listings
//! - `postgres_locking` - Row-lock ordering under concurrency (ignored; needs
//!   `DATABASE_URL`)

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use axum::Router;
use chrono::Duration;
use http_body_util::BodyExt;
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;

use attireburg_core::{Email, Locale, UserId, UserRole};
use attireburg_server::config::AppConfig;
use attireburg_server::db::{MemoryStore, Store};
use attireburg_server::services::{AuthUser, Mailer, MemoryMailer};
use attireburg_server::state::AppState;

/// High-entropy key accepted by the secret strength checks.
pub const TEST_SECRET: &str = "aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6%";

pub const ADMIN_EMAIL: &str = "ops@attireburg.de";

/// Configuration without SMTP or PayPal.
#[must_use]
pub fn test_config(locale: Locale) -> AppConfig {
    AppConfig {
        database_url: SecretString::from("postgres://localhost/attireburg_test"),
        host: "127.0.0.1".parse().unwrap(),
        port: 3000,
        base_url: "https://attireburg.de".parse().unwrap(),
        jwt_secret: SecretString::from(TEST_SECRET),
        link_secret: SecretString::from(TEST_SECRET),
        locale,
        email: None,
        paypal: None,
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 1.0,
    }
}

/// A router over fresh in-process state.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub mailer: Arc<MemoryMailer>,
}

/// Status and body of a response. `json` is `Null` for non-JSON bodies.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub json: Value,
    pub text: String,
}

impl TestApp {
    #[must_use]
    pub fn new() -> Self {
        Self::with_locale(Locale::De)
    }

    #[must_use]
    pub fn with_locale(locale: Locale) -> Self {
        let store = Arc::new(MemoryStore::new());
        let mailer = Arc::new(MemoryMailer::new());
        let state = AppState::new(
            test_config(locale),
            Arc::clone(&store) as Arc<dyn Store>,
            Arc::clone(&mailer) as Arc<dyn Mailer>,
        );
        Self {
            router: attireburg_server::app(state.clone()),
            state,
            store,
            mailer,
        }
    }

    /// Signed access token valid for one hour.
    #[must_use]
    pub fn token(&self, user_id: i32, email: &str, role: UserRole) -> String {
        let user = AuthUser {
            id: UserId::new(user_id),
            email: Email::parse(email).unwrap(),
            role,
        };
        self.state.jwt().issue(&user, Duration::hours(1)).unwrap()
    }

    #[must_use]
    pub fn admin_token(&self) -> String {
        self.token(900, ADMIN_EMAIL, UserRole::Admin)
    }

    #[must_use]
    pub fn customer_token(&self, user_id: i32, email: &str) -> String {
        self.token(user_id, email, UserRole::Customer)
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse { status, json, text }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.send(Method::PUT, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(Method::DELETE, uri, token, None).await
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}
