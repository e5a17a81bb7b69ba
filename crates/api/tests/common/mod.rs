#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use beacon_api::auth::jwt::{generate_access_token, JwtConfig, TokenSubject};
use beacon_api::config::ServerConfig;
use beacon_api::router::build_app_router;
use beacon_api::state::AppState;
use beacon_core::roles::{ROLE_ADMIN, ROLE_BUSINESS_OWNER, ROLE_TOWN_ADMIN};
use beacon_core::types::DbId;
use beacon_delivery::testing::ScriptedProvider;
use beacon_delivery::{DispatchConfig, Dispatcher, ExpoConfig};
use beacon_engine::store::memory::MemoryStore;
use beacon_engine::NotificationEngine;
use http_body_util::BodyExt;
use tower::ServiceExt;

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default)
/// and a 30-second request timeout.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        quota_reset_interval_secs: 3600,
        jwt: JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            access_token_expiry_mins: 15,
        },
        push: ExpoConfig::default(),
        dispatch: DispatchConfig::default(),
    }
}

/// Build the full application router over an in-memory store and a
/// scripted push provider.
///
/// Uses the same [`build_app_router`] as `main.rs`, so the middleware stack
/// (CORS, request ID, timeout, tracing, panic recovery) is exercised too.
pub fn build_test_app(store: Arc<MemoryStore>, provider: Arc<ScriptedProvider>) -> Router {
    build_test_app_with_config(store, provider, test_config())
}

/// [`build_test_app`] with a caller-supplied configuration.
pub fn build_test_app_with_config(
    store: Arc<MemoryStore>,
    provider: Arc<ScriptedProvider>,
    config: ServerConfig,
) -> Router {
    let dispatcher = Dispatcher::new(provider, config.dispatch.clone());
    let state = AppState {
        engine: NotificationEngine::new(store, dispatcher),
        config: Arc::new(config.clone()),
    };
    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

pub fn token_for(user_id: DbId, role: &str, business_id: Option<DbId>, town_id: Option<DbId>) -> String {
    generate_access_token(
        TokenSubject {
            user_id,
            role,
            business_id,
            town_id,
        },
        &test_config().jwt,
    )
    .expect("token generation should succeed")
}

pub fn admin_token(user_id: DbId) -> String {
    token_for(user_id, ROLE_ADMIN, None, None)
}

pub fn town_admin_token(user_id: DbId, town_id: DbId) -> String {
    token_for(user_id, ROLE_TOWN_ADMIN, None, Some(town_id))
}

pub fn owner_token(user_id: DbId, business_id: DbId) -> String {
    token_for(user_id, ROLE_BUSINESS_OWNER, Some(business_id), None)
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub async fn send(app: Router, method: Method, uri: &str, token: Option<&str>, body: Option<serde_json::Value>) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("Content-Type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    app.oneshot(builder.body(body).unwrap()).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None, None).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::GET, uri, Some(token), None).await
}

pub async fn post_json(app: Router, uri: &str, token: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(token), Some(body)).await
}

pub async fn put_json(app: Router, uri: &str, token: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::PUT, uri, Some(token), Some(body)).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
