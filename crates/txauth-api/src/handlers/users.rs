//! User directory handlers
//!
//! Author: hephaex@gmail.com

use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::auth::SessionToken;
use crate::error::AppError;
use crate::models::{UserInfo, UserView};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Extension, Json,
};
use futures::future::try_join_all;
use std::sync::Arc;
use txauth_core::{AccountError, AuthContext, User};

async fn with_accounts(
    state: &AppState,
    user: User,
    token: &SessionToken,
) -> Result<UserInfo, AppError> {
    let accounts = state
        .accounts_client
        .accounts_for(&user.national_id, &token.0)
        .await?;
    Ok(UserInfo::new(user, accounts))
}

/// List every user with their accounts (admin only)
#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "users",
    responses(
        (status = 200, description = "All users", body = Vec<UserInfo>),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
        (status = 403, description = "Caller is not an admin", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(token): Extension<SessionToken>,
) -> Result<Json<Vec<UserInfo>>, AppError> {
    let users = state.accounts.list_all().await?;
    let infos = try_join_all(
        users
            .into_iter()
            .map(|user| with_accounts(&state, user, &token)),
    )
    .await?;

    Ok(Json(infos))
}

/// One user with their accounts (admin or the user themselves)
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    tag = "users",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User found", body = UserInfo),
        (status = 400, description = "Invalid ID"),
        (status = 403, description = "Access denied", body = crate::error::ApiError),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Extension(token): Extension<SessionToken>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<UserInfo>, AppError> {
    if !ctx.can_access(id) {
        audit_log(&AuditEvent::AccessDenied {
            user_id: Some(ctx.subject_id),
            resource: format!("/api/v1/users/{id}"),
            required_role: Some("admin".to_string()),
            ip_address: extract_ip_address(&headers),
            user_agent: extract_user_agent(&headers),
        });
        return Err(AppError::Forbidden);
    }

    let user = state.accounts.get_by_id(id).await?;
    Ok(Json(with_accounts(&state, user, &token).await?))
}

/// Promote a user to admin
///
/// The caller's role is checked before the target is looked up.
#[utoipa::path(
    post,
    path = "/api/v1/users/{username}/upgrade",
    tag = "users",
    params(("username" = String, Path, description = "User to promote")),
    responses(
        (status = 200, description = "User upgraded", body = UserView),
        (status = 403, description = "Caller is not an admin", body = crate::error::ApiError),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn upgrade_user(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(username): Path<String>,
    headers: HeaderMap,
) -> Result<Json<UserView>, AppError> {
    match state.accounts.upgrade_role(ctx.role, &username).await {
        Ok(user) => {
            audit_log(&AuditEvent::RoleUpgrade {
                actor_id: ctx.subject_id,
                target_username: user.username.clone(),
                ip_address: extract_ip_address(&headers),
            });
            Ok(Json(user.into()))
        }
        Err(AccountError::Forbidden) => {
            audit_log(&AuditEvent::AccessDenied {
                user_id: Some(ctx.subject_id),
                resource: format!("/api/v1/users/{username}/upgrade"),
                required_role: Some("admin".to_string()),
                ip_address: extract_ip_address(&headers),
                user_agent: extract_user_agent(&headers),
            });
            Err(AppError::Forbidden)
        }
        Err(err) => Err(err.into()),
    }
}
