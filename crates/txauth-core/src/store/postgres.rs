//! PostgreSQL store implementations
//!
//! Provides user records and the session allow-list using SQLx. Both stores
//! share one connection pool. Session rows carry an `expires_at` column, and
//! expired rows are treated as absent.

use super::{CreateUser, StoreError, TokenStore, UserStore};
use crate::{Role, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use std::time::Duration;

/// Open a connection pool
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, StoreError> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
        .map_err(|e| StoreError::Unavailable(format!("PostgreSQL connection failed: {e}")))
}

/// Create the tables used by both stores if they do not exist yet
pub async fn ensure_schema(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id BIGSERIAL PRIMARY KEY,
            iin VARCHAR(12) NOT NULL UNIQUE,
            username TEXT NOT NULL UNIQUE,
            password TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'user',
            registered_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS session_tokens (
            key TEXT PRIMARY KEY,
            token TEXT NOT NULL,
            expires_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

// ============================================================================
// User Store
// ============================================================================

/// User row from database
#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    iin: String,
    username: String,
    password: String,
    role: String,
    registered_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role: Role = row
            .role
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("user {}: {e}", row.id)))?;

        Ok(User {
            id: row.id,
            national_id: row.iin,
            username: row.username,
            password_hash: row.password,
            role,
            registered_at: row.registered_at,
        })
    }
}

const USER_COLUMNS: &str = "id, iin, username, password, role, registered_at";

/// PostgreSQL user store
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_by(&self, column: &str, value: &str) -> Result<User, StoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        let row: UserRow = sqlx::query_as(&query)
            .bind(value)
            .fetch_one(&self.pool)
            .await?;
        row.try_into()
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, user: CreateUser) -> Result<User, StoreError> {
        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO users (iin, username, password, role, registered_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&user.national_id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.registered_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(user.into_user(row.0))
    }

    async fn get_by_id(&self, id: i64) -> Result<User, StoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row: UserRow = sqlx::query_as(&query)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        row.try_into()
    }

    async fn get_by_username(&self, username: &str) -> Result<User, StoreError> {
        self.fetch_one_by("username", username).await
    }

    async fn get_by_national_id(&self, national_id: &str) -> Result<User, StoreError> {
        self.fetch_one_by("iin", national_id).await
    }

    async fn list_all(&self) -> Result<Vec<User>, StoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id");
        let rows: Vec<UserRow> = sqlx::query_as(&query).fetch_all(&self.pool).await?;
        rows.into_iter().map(User::try_from).collect()
    }

    async fn update_role(&self, username: &str, role: Role) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE users SET role = $1 WHERE username = $2")
            .bind(role.as_str())
            .bind(username)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "postgres"
    }
}

// ============================================================================
// Token Store
// ============================================================================

/// PostgreSQL session allow-list
#[derive(Clone)]
pub struct PgTokenStore {
    pool: PgPool,
}

impl PgTokenStore {
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Delete expired rows, returning how many were removed
    pub async fn purge_expired(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM session_tokens WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| StoreError::Database(format!("TTL out of range: {e}")))?;
        let expires_at = Utc::now() + ttl;

        sqlx::query(
            r#"
            INSERT INTO session_tokens (key, token, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (key) DO UPDATE SET token = EXCLUDED.token, expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<String, StoreError> {
        let token: Option<String> = sqlx::query_scalar(
            "SELECT token FROM session_tokens WHERE key = $1 AND expires_at > NOW()",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        token.ok_or(StoreError::NotFound)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM session_tokens WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_row_conversion() {
        let row = UserRow {
            id: 25,
            iin: "940217450216".to_string(),
            username: "content".to_string(),
            password: "$argon2id$hash".to_string(),
            role: "admin".to_string(),
            registered_at: Utc::now(),
        };

        let user = User::try_from(row).unwrap();
        assert_eq!(user.id, 25);
        assert_eq!(user.national_id, "940217450216");
        assert_eq!(user.role, Role::Admin);
    }

    #[test]
    fn test_user_row_with_unknown_role() {
        let row = UserRow {
            id: 3,
            iin: "940217450216".to_string(),
            username: "content".to_string(),
            password: "hash".to_string(),
            role: "superuser".to_string(),
            registered_at: Utc::now(),
        };

        assert!(matches!(User::try_from(row), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn test_sqlx_error_mapping() {
        assert!(matches!(
            StoreError::from(sqlx::Error::RowNotFound),
            StoreError::NotFound
        ));
        let timeout = StoreError::from(sqlx::Error::PoolTimedOut);
        assert!(timeout.is_transient());
    }
}
