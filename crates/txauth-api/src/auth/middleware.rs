/// Authentication middleware for protecting routes
///
/// Runs the authorization gate on the token carried by the request. On
/// success the [`AuthContext`] and the raw [`SessionToken`] are added to the
/// request extensions for handlers to extract.
use super::cookie::{extract_token, TokenSource};
use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::error::{gate_error_body, AppError};
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use std::fmt;
use std::sync::Arc;
use txauth_core::{AuthContext, GateError};

/// The token that authorized the current request
///
/// Handlers forward it to the accounts service.
#[derive(Clone)]
pub struct SessionToken(pub String);

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

/// Authentication middleware that requires an active session
///
/// # Usage
///
/// ```ignore
/// use axum::{middleware, routing::get, Router};
/// use txauth_api::auth::middleware::auth_middleware;
///
/// let protected = Router::new()
///     .route("/auth/me", get(me_handler))
///     .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));
/// ```
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let presented = extract_token(request.headers());
    let source = presented.as_ref().map(|(_, source)| *source);
    let token = presented.map(|(token, _)| token);

    match state.gate.authorize(token.as_deref()).await {
        Ok(ctx) => {
            request.extensions_mut().insert(ctx);
            if let Some(token) = token {
                request.extensions_mut().insert(SessionToken(token));
            }
            next.run(request).await
        }
        Err(err) => {
            state.record_gate_rejection();
            audit_log(&AuditEvent::InvalidToken {
                reason: err.to_string(),
                ip_address: extract_ip_address(request.headers()),
                user_agent: extract_user_agent(request.headers()),
            });
            reject(&state, err, source)
        }
    }
}

fn reject(state: &AppState, err: GateError, source: Option<TokenSource>) -> Response {
    if source == Some(TokenSource::Cookie) {
        if let Some(target) = state.config.auth.login_redirect.as_deref() {
            return Redirect::to(target).into_response();
        }
    }
    (StatusCode::UNAUTHORIZED, Json(gate_error_body(err))).into_response()
}

/// Admin-only guard, layered inside [`auth_middleware`]
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    let ctx = request
        .extensions()
        .get::<AuthContext>()
        .copied()
        .ok_or(AppError::Unauthorized(GateError::Unauthenticated))?;

    if !ctx.is_admin() {
        audit_log(&AuditEvent::AccessDenied {
            user_id: Some(ctx.subject_id),
            resource: request.uri().path().to_string(),
            required_role: Some("admin".to_string()),
            ip_address: extract_ip_address(request.headers()),
            user_agent: extract_user_agent(request.headers()),
        });
        return Err(AppError::Forbidden);
    }

    Ok(next.run(request).await)
}
