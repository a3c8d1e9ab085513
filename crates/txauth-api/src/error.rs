//! API error handling
//!
//! Author: hephaex@gmail.com

use crate::accounts_client::AccountsClientError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use txauth_core::{AccountError, GateError, StoreError, TokenError, ValidationError};
use utoipa::ToSchema;

const TRY_AGAIN: &str = "Unexpected error. Please try again later";

/// API error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Error code
    pub code: String,
    /// Human-readable message
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new("NOT_FOUND", format!("{resource} not found"))
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn unauthorized() -> Self {
        Self::new("UNAUTHORIZED", "Authentication required")
    }

    pub fn forbidden() -> Self {
        Self::new("FORBIDDEN", "Access denied")
    }

    pub fn internal_error() -> Self {
        Self::new("INTERNAL_ERROR", TRY_AGAIN)
    }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Validation(ValidationError),
    Conflict,
    BadCredentials,
    Unauthorized(GateError),
    Forbidden,
    NotFound(String),
    /// Downstream dependency timed out or is unavailable
    Unavailable(String),
    /// Downstream service returned something unusable
    BadGateway(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ApiError::bad_request(msg)),
            AppError::Validation(err) => (
                StatusCode::BAD_REQUEST,
                ApiError::new("VALIDATION_ERROR", err.to_string()),
            ),
            AppError::Conflict => (
                StatusCode::CONFLICT,
                ApiError::new("DUPLICATE_IDENTITY", "User with this identity already exists"),
            ),
            AppError::BadCredentials => (
                StatusCode::UNAUTHORIZED,
                ApiError::new("BAD_CREDENTIALS", "Invalid username or password"),
            ),
            AppError::Unauthorized(err) => (StatusCode::UNAUTHORIZED, gate_error_body(err)),
            AppError::Forbidden => (StatusCode::FORBIDDEN, ApiError::forbidden()),
            AppError::NotFound(what) => (StatusCode::NOT_FOUND, ApiError::not_found(&what)),
            AppError::Unavailable(detail) => {
                tracing::error!(detail = %detail, "dependency unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ApiError::new("SERVICE_UNAVAILABLE", TRY_AGAIN),
                )
            }
            AppError::BadGateway(detail) => {
                tracing::error!(detail = %detail, "downstream service failed");
                (
                    StatusCode::BAD_GATEWAY,
                    ApiError::new("UPSTREAM_ERROR", TRY_AGAIN),
                )
            }
            AppError::Internal(detail) => {
                tracing::error!(detail = %detail, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, ApiError::internal_error())
            }
        };

        (status, Json(error)).into_response()
    }
}

/// Body for a rejected session; deliberately coarse
pub fn gate_error_body(err: GateError) -> ApiError {
    match err {
        GateError::Unauthenticated => ApiError::unauthorized(),
        GateError::InvalidSignature => ApiError::new("INVALID_TOKEN", "Invalid or expired token"),
        GateError::TokenExpired => ApiError::new("TOKEN_EXPIRED", "Invalid or expired token"),
    }
}

impl From<GateError> for AppError {
    fn from(err: GateError) -> Self {
        AppError::Unauthorized(err)
    }
}

impl From<AccountError> for AppError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Validation(e) => AppError::Validation(e),
            AccountError::DuplicateIdentity => AppError::Conflict,
            AccountError::BadCredentials => AppError::BadCredentials,
            AccountError::Forbidden => AppError::Forbidden,
            AccountError::NotFound => AppError::NotFound("User".to_string()),
            AccountError::Timeout => AppError::Unavailable("store call timed out".to_string()),
            AccountError::Persistence(e) if e.is_transient() => AppError::Unavailable(e.to_string()),
            AccountError::Persistence(e) => AppError::Internal(e.to_string()),
            AccountError::Token(TokenError::Store(e)) if e.is_transient() => {
                AppError::Unavailable(e.to_string())
            }
            AccountError::Token(e) => AppError::Internal(e.to_string()),
            AccountError::Hashing(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AccountError::from(err).into()
    }
}

impl From<AccountsClientError> for AppError {
    fn from(err: AccountsClientError) -> Self {
        match err {
            AccountsClientError::Timeout => {
                AppError::Unavailable("accounts service timed out".to_string())
            }
            other => AppError::BadGateway(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_error_status() {
        let cases = [
            (AccountError::DuplicateIdentity, StatusCode::CONFLICT),
            (AccountError::BadCredentials, StatusCode::UNAUTHORIZED),
            (AccountError::Forbidden, StatusCode::FORBIDDEN),
            (AccountError::NotFound, StatusCode::NOT_FOUND),
            (AccountError::Timeout, StatusCode::SERVICE_UNAVAILABLE),
            (
                AccountError::Validation(ValidationError::InvalidUsername),
                StatusCode::BAD_REQUEST,
            ),
            (
                AccountError::Persistence(StoreError::Database("boom".to_string())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                AccountError::Persistence(StoreError::Unavailable("down".to_string())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];

        for (err, expected) in cases {
            let response = AppError::from(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }

    #[test]
    fn test_gate_errors_are_unauthorized() {
        for err in [
            GateError::Unauthenticated,
            GateError::InvalidSignature,
            GateError::TokenExpired,
        ] {
            let response = AppError::from(err).into_response();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
    }
}
