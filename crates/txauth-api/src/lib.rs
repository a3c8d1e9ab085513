//! txauth API - HTTP server for accounts and sessions
//!
//! Exposes registration, sign-in, sign-out and the user directory over JSON,
//! with sessions carried as a bearer token or the `access-token` cookie.

pub mod accounts_client;
pub mod audit;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod openapi;
pub mod routes;
pub mod state;

use crate::accounts_client::NoAccountsClient;
use crate::handlers::health;
use crate::state::AppState;
use axum::{extract::DefaultBodyLimit, middleware as axum_middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use txauth_core::config::AppConfig;
use txauth_core::store::{InMemoryTokenStore, InMemoryUserStore};
use txauth_core::{CredentialHasher, PasswordConfig};

/// Build the full application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.server.max_body_size;

    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::prometheus_metrics))
        .route("/metrics/json", get(health::metrics))
        .route("/api-docs/openapi.json", get(openapi::openapi_json))
        .nest("/api/v1", routes::api_routes(state.clone()))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::metrics_middleware,
        ))
        .layer(axum_middleware::from_fn(
            middleware::security_headers_middleware,
        ))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// State over in-memory stores with cheap hashing and no accounts service
pub fn create_test_state() -> Arc<AppState> {
    let mut config = AppConfig::default();
    config.accounts.base_url.clear();

    Arc::new(AppState::new(
        config,
        Arc::new(InMemoryUserStore::new()),
        Arc::new(InMemoryTokenStore::new()),
        CredentialHasher::new(PasswordConfig::lightweight()),
        Arc::new(NoAccountsClient),
    ))
}

/// Router over [`create_test_state`]
pub fn create_router_for_testing() -> Router {
    create_router(create_test_state())
}
