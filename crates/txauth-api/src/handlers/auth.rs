//! Authentication API handlers
//!
//! Registration, sign-in, sign-out and the current user's profile.
//!
//! Author: hephaex@gmail.com

use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::auth::cookie::{cleared_session_cookie, session_cookie};
use crate::error::AppError;
use crate::models::{LoginRequest, LoginResponse, MessageResponse, RegisterRequest, UserView};
use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;
use txauth_core::{AccountError, AuthContext, NewUser};

/// Register a new user account
///
/// New users always get the `user` role.
///
/// # Responses
///
/// * `201 Created` - User registered
/// * `400 Bad Request` - Username, password or national ID rejected
/// * `409 Conflict` - National ID or username already taken
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered successfully", body = UserView),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 409, description = "Identity already exists", body = crate::error::ApiError),
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let username = request.username.clone();
    let new_user = NewUser::new(request.username, request.password, request.iin);

    match state.accounts.register(new_user).await {
        Ok(user) => {
            audit_log(&AuditEvent::RegistrationSuccess {
                user_id: user.id,
                username: user.username.clone(),
                role: user.role.to_string(),
                ip_address: extract_ip_address(&headers),
                user_agent: extract_user_agent(&headers),
            });
            Ok((StatusCode::CREATED, Json(UserView::from(user))))
        }
        Err(err) => {
            audit_log(&AuditEvent::RegistrationFailure {
                username,
                reason: err.to_string(),
                ip_address: extract_ip_address(&headers),
                user_agent: extract_user_agent(&headers),
            });
            Err(err.into())
        }
    }
}

/// Sign in with username and password
///
/// Returns the session token in the body and in the `access-token` cookie.
/// Signing in again replaces the previous session.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Missing username or password", body = crate::error::ApiError),
        (status = 401, description = "Invalid credentials", body = crate::error::ApiError),
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    if request.username.is_empty() || request.password.is_empty() {
        return Err(AppError::BadRequest(
            "username or password must be filled".to_string(),
        ));
    }

    let session = match state
        .accounts
        .authenticate(&request.username, &request.password)
        .await
    {
        Ok(session) => session,
        Err(err) => {
            if matches!(err, AccountError::BadCredentials) {
                state.record_login(false);
                audit_log(&AuditEvent::LoginFailure {
                    username: request.username,
                    reason: err.to_string(),
                    ip_address: extract_ip_address(&headers),
                    user_agent: extract_user_agent(&headers),
                });
            }
            return Err(err.into());
        }
    };

    state.record_login(true);
    audit_log(&AuditEvent::LoginSuccess {
        user_id: session.user.id,
        username: session.user.username.clone(),
        ip_address: extract_ip_address(&headers),
        user_agent: extract_user_agent(&headers),
    });

    let expires_at = chrono::Utc::now()
        + chrono::Duration::from_std(session.expires_in)
            .map_err(|e| AppError::Internal(e.to_string()))?;
    let cookie = session_cookie(&session.token, expires_at, state.config.auth.secure_cookie);

    let body = LoginResponse {
        access_token: session.token,
        token_type: "Bearer".to_string(),
        expires_in: session.expires_in.as_secs(),
        user: session.user.into(),
    };

    Ok(([(header::SET_COOKIE, cookie)], Json(body)))
}

/// End the current session
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "auth",
    responses(
        (status = 200, description = "Logout successful", body = MessageResponse),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    state.accounts.sign_out(ctx.subject_id).await?;

    audit_log(&AuditEvent::Logout {
        user_id: ctx.subject_id,
        ip_address: extract_ip_address(&headers),
    });

    let cookie = cleared_session_cookie(state.config.auth.secure_cookie);
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(MessageResponse::new("Logged out successfully")),
    ))
}

/// Profile of the signed-in user
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Current user", body = UserView),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Json<UserView>, AppError> {
    let user = state.accounts.get_by_id(ctx.subject_id).await?;
    Ok(Json(user.into()))
}
