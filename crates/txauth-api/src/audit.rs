//! Security audit logging for authentication events
//!
//! All audit events are logged at INFO level with the "audit" target, so they
//! can be filtered and routed separately from application logs. Tokens and
//! passwords never appear in an event.
//!
//! # Example
//!
//! ```ignore
//! use txauth_api::audit::{audit_log, AuditEvent};
//!
//! audit_log(&AuditEvent::LoginSuccess {
//!     user_id: user.id,
//!     username: user.username.clone(),
//!     ip_address: Some("192.168.1.1".to_string()),
//!     user_agent: None,
//! });
//! ```
//!
//! Author: hephaex@gmail.com

use axum::http::{header, HeaderMap};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Security audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    LoginSuccess {
        user_id: i64,
        username: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Carries the generic rejection reason; unknown username and wrong
    /// password are told apart only by the account service's debug log
    LoginFailure {
        username: String,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    Logout {
        user_id: i64,
        ip_address: Option<String>,
    },

    RegistrationSuccess {
        user_id: i64,
        username: String,
        role: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    RegistrationFailure {
        username: String,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Authenticated caller lacks the role for a resource
    AccessDenied {
        user_id: Option<i64>,
        resource: String,
        required_role: Option<String>,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Session rejected by the authorization gate
    InvalidToken {
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    RoleUpgrade {
        actor_id: i64,
        target_username: String,
        ip_address: Option<String>,
    },
}

impl AuditEvent {
    fn summary(&self) -> &'static str {
        match self {
            AuditEvent::LoginSuccess { .. } => "Login successful",
            AuditEvent::LoginFailure { .. } => "Login failed",
            AuditEvent::Logout { .. } => "User logout",
            AuditEvent::RegistrationSuccess { .. } => "Registration successful",
            AuditEvent::RegistrationFailure { .. } => "Registration failed",
            AuditEvent::AccessDenied { .. } => "Access denied",
            AuditEvent::InvalidToken { .. } => "Invalid token",
            AuditEvent::RoleUpgrade { .. } => "Role upgraded",
        }
    }

    fn user_id(&self) -> Option<i64> {
        match self {
            AuditEvent::LoginSuccess { user_id, .. }
            | AuditEvent::Logout { user_id, .. }
            | AuditEvent::RegistrationSuccess { user_id, .. } => Some(*user_id),
            AuditEvent::AccessDenied { user_id, .. } => *user_id,
            AuditEvent::RoleUpgrade { actor_id, .. } => Some(*actor_id),
            _ => None,
        }
    }

    fn ip_address(&self) -> Option<&str> {
        match self {
            AuditEvent::LoginSuccess { ip_address, .. }
            | AuditEvent::LoginFailure { ip_address, .. }
            | AuditEvent::Logout { ip_address, .. }
            | AuditEvent::RegistrationSuccess { ip_address, .. }
            | AuditEvent::RegistrationFailure { ip_address, .. }
            | AuditEvent::AccessDenied { ip_address, .. }
            | AuditEvent::InvalidToken { ip_address, .. }
            | AuditEvent::RoleUpgrade { ip_address, .. } => ip_address.as_deref(),
        }
    }
}

/// Log a security audit event with structured fields
///
/// The full event is attached as JSON in the `event` field for log
/// aggregators; the common fields are also emitted individually.
pub fn audit_log(event: &AuditEvent) {
    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));

    info!(
        target: "audit",
        event_id = %Uuid::new_v4(),
        timestamp = %Utc::now(),
        event = %event_json,
        user_id = ?event.user_id(),
        ip_address = ?event.ip_address(),
        "{}",
        event.summary()
    );
}

/// Client IP from proxy headers (X-Forwarded-For, then X-Real-IP)
pub fn extract_ip_address(headers: &HeaderMap) -> Option<String> {
    if let Some(xff) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first_ip) = xff.split(',').next() {
            return Some(first_ip.trim().to_string());
        }
    }

    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_event_serialization() {
        let event = AuditEvent::LoginSuccess {
            user_id: 7,
            username: "jack".to_string(),
            ip_address: Some("192.168.1.1".to_string()),
            user_agent: Some("Mozilla/5.0".to_string()),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event_type\":\"login_success\""));
        assert!(json.contains("jack"));
        assert_eq!(event.user_id(), Some(7));
        assert_eq!(event.ip_address(), Some("192.168.1.1"));
    }

    #[test]
    fn test_audit_log_does_not_panic() {
        audit_log(&AuditEvent::LoginFailure {
            username: "jack".to_string(),
            reason: "Invalid username or password".to_string(),
            ip_address: None,
            user_agent: None,
        });
        audit_log(&AuditEvent::AccessDenied {
            user_id: Some(2),
            resource: "/api/v1/users".to_string(),
            required_role: Some("admin".to_string()),
            ip_address: None,
            user_agent: Some("Test".to_string()),
        });
    }

    #[test]
    fn test_extract_ip_from_x_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            "203.0.113.1, 198.51.100.1".parse().unwrap(),
        );

        assert_eq!(extract_ip_address(&headers), Some("203.0.113.1".to_string()));
    }

    #[test]
    fn test_extract_ip_from_x_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "203.0.113.1".parse().unwrap());

        assert_eq!(extract_ip_address(&headers), Some("203.0.113.1".to_string()));
    }

    #[test]
    fn test_extract_missing_headers() {
        let headers = HeaderMap::new();

        assert_eq!(extract_ip_address(&headers), None);
        assert_eq!(extract_user_agent(&headers), None);
    }
}
