//! txauth Core - Domain models, validation rules and session use cases
//!
//! This crate holds everything that does not depend on the HTTP transport:
//! - User and role models
//! - Identity validation (username, password, national ID)
//! - Credential hashing
//! - Signed session tokens with a server-side allow-list
//! - Account use cases (registration, sign-in, role upgrade)
//! - The authorization gate used by the HTTP middleware
//! - Store abstractions with PostgreSQL and in-memory implementations
//! - Configuration management

pub mod account;
pub mod config;
pub mod gate;
pub mod password;
pub mod store;
pub mod token;
pub mod validate;

pub use account::{AccountError, AccountService, NewUser, SignedInSession};
pub use config::{AppConfig, AuthConfig, BootstrapAdmin, ConfigError};
pub use gate::{AuthContext, AuthorizationGate, GateError};
pub use password::{CredentialHasher, PasswordConfig, PasswordError};
pub use store::{CreateUser, StoreError, TokenStore, UserStore};
pub use token::{Claims, TokenConfig, TokenError, TokenService};
pub use validate::{validate_identity, ValidationError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Roles
// ============================================================================

/// Access level of a user account
///
/// - `User`: may read its own profile and accounts
/// - `Admin`: may list every user and upgrade other users
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a role string is not recognised
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

// ============================================================================
// Users
// ============================================================================

/// A registered user as held by the user store
///
/// `password_hash` is an Argon2id PHC string and is never serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Store-assigned identifier
    pub id: i64,
    /// 12-digit national identification number (IIN), unique
    pub national_id: String,
    /// Login name, unique, lowercase letters and digits only
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
    /// Set once at registration
    pub registered_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Bank account record returned by the downstream accounts service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub number: String,
    pub balance: i64,
    #[serde(rename = "registerDate")]
    pub register_date: String,
    #[serde(rename = "lasttransaction")]
    pub last_transaction: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_conversion() {
        assert_eq!(Role::Admin.as_str(), "admin");
        assert_eq!(Role::User.as_str(), "user");
        assert_eq!("ADMIN".parse::<Role>(), Ok(Role::Admin));
        assert_eq!("user".parse::<Role>(), Ok(Role::User));
        assert!("root".parse::<Role>().is_err());
        assert_eq!(Role::default(), Role::User);
    }

    #[test]
    fn test_user_serialization_hides_hash() {
        let user = User {
            id: 7,
            national_id: "940217450216".to_string(),
            username: "jack".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            role: Role::User,
            registered_at: Utc::now(),
        };

        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2id"));
        assert!(json.contains("\"role\":\"user\""));
    }

    #[test]
    fn test_account_wire_format() {
        let json = r#"{"number":"KZ01","balance":1500,"registerDate":"2021-01-01","lasttransaction":"2021-02-01"}"#;
        let account: Account = serde_json::from_str(json).unwrap();
        assert_eq!(account.number, "KZ01");
        assert_eq!(account.balance, 1500);
        assert_eq!(account.last_transaction, "2021-02-01");
    }
}
