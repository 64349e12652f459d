//! Reusable test helpers for HTTP integration tests.
//!
//! [`TestApp`] drives the full axum router through `tower::ServiceExt::oneshot`.
//! The pool never connects, so only paths that stay off the database are
//! exercised here. Database-backed behaviour is covered by the `#[sqlx::test]`
//! suites inside the crate.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{self, header, Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use taubot_server::api::{create_router, AppState};
use taubot_server::config::Config;
use taubot_server::economy::build_tree;
use taubot_server::permissions::MemoryGrantStore;
use tower::ServiceExt;

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub grants: Arc<MemoryGrantStore>,
}

impl TestApp {
    /// App with default test configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default_for_test())
    }

    /// App requiring `Authorization: Bot <token>` on gateway routes.
    pub fn with_token(token: &str) -> Self {
        let mut config = Config::default_for_test();
        config.interactions_token = Some(token.to_string());
        Self::with_config(config)
    }

    pub fn with_config(config: Config) -> Self {
        let pool = taubot_server::db::pool_options(1)
            .acquire_timeout(Duration::from_millis(50))
            .connect_lazy(&config.database_url)
            .expect("valid database url");
        let grants = Arc::new(MemoryGrantStore::new());
        let tree = build_tree().expect("command tree");
        let state = AppState::new(pool, config, grants.clone(), tree);

        Self {
            router: create_router(state.clone()),
            state,
            grants,
        }
    }

    /// Build an HTTP request with the given method and URI.
    pub fn request(method: Method, uri: &str) -> http::request::Builder {
        Request::builder().method(method).uri(uri)
    }

    /// JSON request body.
    pub fn json(method: Method, uri: &str, body: &Value) -> Request<Body> {
        Self::request(method, uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    /// Send a request through the router via `tower::ServiceExt::oneshot`.
    pub async fn oneshot(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot request failed")
    }

    /// POST an interaction payload.
    pub async fn interact(&self, payload: &Value) -> Response<Body> {
        self.oneshot(Self::json(Method::POST, "/interactions", payload))
            .await
    }
}

/// Read the response body as JSON.
pub async fn body_to_json(response: Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to collect response body")
        .to_bytes();
    serde_json::from_slice(&bytes).unwrap_or_else(|e| {
        let preview = String::from_utf8_lossy(&bytes);
        panic!("Failed to parse response as JSON: {e}\nBody: {preview}")
    })
}
