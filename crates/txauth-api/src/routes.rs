//! API route definitions
//!
//! Author: hephaex@gmail.com

use crate::auth::middleware::{auth_middleware, require_admin};
use crate::handlers::{auth, users};
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Create API v1 routes
pub fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register_handler))
        .route("/auth/login", post(auth::login_handler));

    // Admin only
    let admin_routes = Router::new()
        .route("/users", get(users::list_users))
        .route_layer(middleware::from_fn(require_admin));

    // Protected routes (active session required)
    let protected_routes = Router::new()
        .route("/auth/logout", post(auth::logout_handler))
        .route("/auth/me", get(auth::me_handler))
        .route("/users/:user", get(users::get_user))
        .route("/users/:user/upgrade", post(users::upgrade_user))
        .merge(admin_routes)
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new().merge(public_routes).merge(protected_routes)
}
