//! Storage abstractions
//!
//! The account use cases only talk to these traits:
//! - [`UserStore`]: durable user records
//! - [`TokenStore`]: key-value allow-list of active session tokens with TTL
//!
//! Implementations live in [`postgres`] (production) and [`memory`]
//! (tests and local development). Each implementation is responsible for its
//! own internal synchronisation.

pub mod memory;
pub mod postgres;

pub use memory::{InMemoryTokenStore, InMemoryUserStore};
pub use postgres::{PgTokenStore, PgUserStore};

use crate::{Role, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found")]
    NotFound,

    #[error("Record conflicts with an existing one: {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Whether a caller may reasonably retry the operation later
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Conflict(db.message().to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            _ => StoreError::Database(err.to_string()),
        }
    }
}

/// Fields needed to persist a new user; the store assigns the ID
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub national_id: String,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub registered_at: DateTime<Utc>,
}

impl CreateUser {
    pub fn into_user(self, id: i64) -> User {
        User {
            id,
            national_id: self.national_id,
            username: self.username,
            password_hash: self.password_hash,
            role: self.role,
            registered_at: self.registered_at,
        }
    }
}

/// Durable user records
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Persist a new user. Fails with `Conflict` if the username or national
    /// ID is already taken.
    async fn create(&self, user: CreateUser) -> Result<User, StoreError>;

    async fn get_by_id(&self, id: i64) -> Result<User, StoreError>;

    async fn get_by_username(&self, username: &str) -> Result<User, StoreError>;

    async fn get_by_national_id(&self, national_id: &str) -> Result<User, StoreError>;

    /// All users ordered by ID
    async fn list_all(&self) -> Result<Vec<User>, StoreError>;

    /// Change the role of an existing user
    async fn update_role(&self, username: &str, role: Role) -> Result<(), StoreError>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Key-value allow-list of session tokens
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value. The entry
    /// disappears after `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Current value under `key`, or `NotFound` if absent or expired
    async fn get(&self, key: &str) -> Result<String, StoreError>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Backend name for logging
    fn name(&self) -> &str;
}
