//! In-memory store implementations
//!
//! Used by tests and by local development when no database URL is
//! configured. State is lost on restart.

use super::{CreateUser, StoreError, TokenStore, UserStore};
use crate::{Role, User};
use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

// ============================================================================
// User Store
// ============================================================================

#[derive(Debug, Default)]
struct UserTable {
    next_id: i64,
    users: BTreeMap<i64, User>,
}

/// User store backed by a map guarded by an async `RwLock`
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    table: RwLock<UserTable>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn create(&self, user: CreateUser) -> Result<User, StoreError> {
        let mut table = self.table.write().await;

        if table.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict(format!(
                "username {} already exists",
                user.username
            )));
        }
        if table.users.values().any(|u| u.national_id == user.national_id) {
            return Err(StoreError::Conflict("national ID already exists".to_string()));
        }

        table.next_id += 1;
        let id = table.next_id;
        let user = user.into_user(id);
        table.users.insert(id, user.clone());

        Ok(user)
    }

    async fn get_by_id(&self, id: i64) -> Result<User, StoreError> {
        self.table
            .read()
            .await
            .users
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_by_username(&self, username: &str) -> Result<User, StoreError> {
        self.table
            .read()
            .await
            .users
            .values()
            .find(|u| u.username == username)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_by_national_id(&self, national_id: &str) -> Result<User, StoreError> {
        self.table
            .read()
            .await
            .users
            .values()
            .find(|u| u.national_id == national_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list_all(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.table.read().await.users.values().cloned().collect())
    }

    async fn update_role(&self, username: &str, role: Role) -> Result<(), StoreError> {
        let mut table = self.table.write().await;
        let user = table
            .users
            .values_mut()
            .find(|u| u.username == username)
            .ok_or(StoreError::NotFound)?;
        user.role = role;
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

// ============================================================================
// Token Store
// ============================================================================

/// Upper bound on concurrently held sessions
const DEFAULT_SESSION_CAPACITY: u64 = 100_000;

#[derive(Debug, Clone)]
struct SessionEntry {
    token: String,
    ttl: Duration,
}

/// Gives each entry the TTL it was written with; rewriting a key restarts it
struct SessionExpiry;

impl Expiry<String, SessionEntry> for SessionExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &SessionEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &SessionEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Token store backed by a moka cache with per-entry time-to-live
#[derive(Clone)]
pub struct InMemoryTokenStore {
    cache: Cache<String, SessionEntry>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SESSION_CAPACITY)
    }

    pub fn with_capacity(max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(SessionExpiry)
            .build();

        Self { cache }
    }
}

impl Default for InMemoryTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let entry = SessionEntry {
            token: value.to_string(),
            ttl,
        };
        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<String, StoreError> {
        self.cache
            .get(key)
            .await
            .map(|entry| entry.token)
            .ok_or(StoreError::NotFound)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
