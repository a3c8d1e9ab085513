//! Authorization gate
//!
//! Turns a presented session token into an [`AuthContext`] or a coarse
//! rejection. Transport concerns (where the token came from, what the
//! rejection looks like on the wire) belong to the HTTP layer.

use crate::token::{TokenError, TokenService};
use crate::Role;
use thiserror::Error;

/// Authenticated caller, attached to the request after the gate passes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthContext {
    pub subject_id: i64,
    pub role: Role,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Admins may access everyone, users only themselves
    pub fn can_access(&self, subject_id: i64) -> bool {
        self.is_admin() || self.subject_id == subject_id
    }
}

/// Gate rejections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GateError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Token has expired")]
    TokenExpired,
}

#[derive(Clone)]
pub struct AuthorizationGate {
    tokens: TokenService,
}

impl AuthorizationGate {
    pub fn new(tokens: TokenService) -> Self {
        Self { tokens }
    }

    /// Check a presented token
    ///
    /// `None` means the request carried no token at all.
    pub async fn authorize(&self, token: Option<&str>) -> Result<AuthContext, GateError> {
        let token = match token {
            Some(t) if !t.is_empty() => t,
            _ => return Err(GateError::Unauthenticated),
        };

        let claims = self.tokens.validate(token).map_err(|e| match e {
            TokenError::TokenExpired => GateError::TokenExpired,
            _ => GateError::InvalidSignature,
        })?;

        let subject_id =
            TokenService::extract_subject(&claims).map_err(|_| GateError::Unauthenticated)?;

        match self.tokens.is_allow_listed(subject_id, token).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(subject_id, "token is not the active session");
                return Err(GateError::Unauthenticated);
            }
            Err(e) => {
                tracing::warn!(subject_id, error = %e, "allow-list lookup failed");
                return Err(GateError::Unauthenticated);
            }
        }

        let role = TokenService::extract_role(&claims).map_err(|_| GateError::Unauthenticated)?;

        Ok(AuthContext { subject_id, role })
    }
}
