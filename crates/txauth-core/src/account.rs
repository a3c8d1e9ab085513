//! Account use cases
//!
//! Registration, sign-in, sign-out, role upgrade and user lookups. Every
//! store round trip is bounded by the configured request timeout; an expired
//! bound surfaces as [`AccountError::Timeout`] and is never retried here.

use crate::config::BootstrapAdmin;
use crate::password::{CredentialHasher, PasswordError};
use crate::store::{CreateUser, StoreError, UserStore};
use crate::token::{TokenError, TokenService};
use crate::validate::{validate_identity, ValidationError};
use crate::{Role, User};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Account use case errors
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("User with this identity already exists")]
    DuplicateIdentity,

    #[error("Invalid username or password")]
    BadCredentials,

    #[error("Insufficient permissions")]
    Forbidden,

    #[error("User not found")]
    NotFound,

    #[error("Token error: {0}")]
    Token(TokenError),

    #[error("Persistence error: {0}")]
    Persistence(StoreError),

    #[error("Operation timed out")]
    Timeout,

    #[error("Hashing error: {0}")]
    Hashing(#[from] PasswordError),
}

impl From<StoreError> for AccountError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AccountError::NotFound,
            StoreError::Conflict(_) => AccountError::DuplicateIdentity,
            other => AccountError::Persistence(other),
        }
    }
}

impl From<TokenError> for AccountError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Timeout => AccountError::Timeout,
            other => AccountError::Token(other),
        }
    }
}

/// Registration request
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub national_id: String,
    /// Role to assign; `None` means [`Role::User`]. Callers facing the
    /// network never set this.
    pub role: Option<Role>,
}

impl NewUser {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        national_id: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            national_id: national_id.into(),
            role: None,
        }
    }
}

/// Result of a successful sign-in
#[derive(Debug, Clone)]
pub struct SignedInSession {
    pub token: String,
    pub user: User,
    /// Token lifetime
    pub expires_in: Duration,
}

/// Account use cases over a user store and the token service
#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UserStore>,
    hasher: CredentialHasher,
    tokens: TokenService,
    request_timeout: Duration,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UserStore>,
        hasher: CredentialHasher,
        tokens: TokenService,
        request_timeout: Duration,
    ) -> Self {
        Self {
            users,
            hasher,
            tokens,
            request_timeout,
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Register a new user
    ///
    /// The national ID uniqueness check runs before validation, matching the
    /// order callers observe in error responses.
    pub async fn register(&self, new_user: NewUser) -> Result<User, AccountError> {
        match self
            .bounded(self.users.get_by_national_id(&new_user.national_id))
            .await
        {
            Ok(_) => return Err(AccountError::DuplicateIdentity),
            Err(AccountError::NotFound) => {}
            Err(e) => return Err(e),
        }

        validate_identity(&new_user.username, &new_user.password, &new_user.national_id)?;

        let password_hash = self.hash_password(new_user.password).await?;

        let user = self
            .bounded(self.users.create(CreateUser {
                national_id: new_user.national_id,
                username: new_user.username,
                password_hash,
                role: new_user.role.unwrap_or_default(),
                registered_at: Utc::now(),
            }))
            .await?;

        tracing::info!(user_id = user.id, username = %user.username, role = %user.role, "user registered");
        Ok(user)
    }

    /// Check credentials and start a session
    ///
    /// The new token replaces any session the user already had.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<SignedInSession, AccountError> {
        let user = match self.bounded(self.users.get_by_username(username)).await {
            Ok(user) => user,
            Err(AccountError::NotFound) => {
                tracing::debug!(username, "sign-in for unknown username");
                return Err(AccountError::BadCredentials);
            }
            Err(e) => return Err(e),
        };

        if !self.verify_password(&user.password_hash, password).await? {
            tracing::debug!(user_id = user.id, "sign-in with wrong password");
            return Err(AccountError::BadCredentials);
        }

        let token = self.tokens.issue(user.id, user.role, &user.national_id)?;
        self.tokens.insert(user.id, &token).await?;

        Ok(SignedInSession {
            token,
            user,
            expires_in: self.tokens.access_ttl(),
        })
    }

    /// End the active session of a subject
    pub async fn sign_out(&self, subject_id: i64) -> Result<(), AccountError> {
        self.tokens.revoke(subject_id).await?;
        Ok(())
    }

    /// Promote `target_username` to admin on behalf of an actor with `actor_role`
    pub async fn upgrade_role(
        &self,
        actor_role: Role,
        target_username: &str,
    ) -> Result<User, AccountError> {
        if !actor_role.is_admin() {
            return Err(AccountError::Forbidden);
        }

        let mut user = self
            .bounded(self.users.get_by_username(target_username))
            .await?;

        self.bounded(self.users.update_role(target_username, Role::Admin))
            .await?;
        user.role = Role::Admin;

        tracing::info!(user_id = user.id, username = %user.username, "user upgraded to admin");
        Ok(user)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<User, AccountError> {
        self.bounded(self.users.get_by_id(id)).await
    }

    pub async fn get_by_username(&self, username: &str) -> Result<User, AccountError> {
        self.bounded(self.users.get_by_username(username)).await
    }

    pub async fn get_by_national_id(&self, national_id: &str) -> Result<User, AccountError> {
        self.bounded(self.users.get_by_national_id(national_id))
            .await
    }

    pub async fn list_all(&self) -> Result<Vec<User>, AccountError> {
        self.bounded(self.users.list_all()).await
    }

    /// Register the configured admin unless a user with its national ID exists
    ///
    /// Returns the created user, or `None` when nothing was done.
    pub async fn ensure_admin(
        &self,
        admin: &BootstrapAdmin,
    ) -> Result<Option<User>, AccountError> {
        match self.get_by_national_id(&admin.national_id).await {
            Ok(existing) => {
                if !existing.is_admin() {
                    tracing::warn!(
                        user_id = existing.id,
                        "bootstrap admin national ID belongs to a non-admin user"
                    );
                }
                return Ok(None);
            }
            Err(AccountError::NotFound) => {}
            Err(e) => return Err(e),
        }

        let user = self
            .register(NewUser {
                role: Some(Role::Admin),
                ..NewUser::new(&admin.username, &admin.password, &admin.national_id)
            })
            .await?;

        Ok(Some(user))
    }

    async fn bounded<T, F>(&self, op: F) -> Result<T, AccountError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.request_timeout, op).await {
            Ok(result) => result.map_err(AccountError::from),
            Err(_) => {
                tracing::warn!(
                    store = self.users.name(),
                    timeout_ms = self.request_timeout.as_millis() as u64,
                    "user store call timed out"
                );
                Err(AccountError::Timeout)
            }
        }
    }

    // Argon2 is CPU bound; keep it off the async workers.
    async fn hash_password(&self, password: String) -> Result<String, AccountError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))?
            .map_err(AccountError::from)
    }

    async fn verify_password(&self, digest: &str, candidate: &str) -> Result<bool, AccountError> {
        let hasher = self.hasher.clone();
        let digest = digest.to_string();
        let candidate = candidate.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&digest, &candidate))
            .await
            .map_err(|e| PasswordError::VerificationFailed(e.to_string()))?
            .map_err(AccountError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::{AuthorizationGate, GateError};
    use crate::password::PasswordConfig;
    use crate::store::{InMemoryTokenStore, InMemoryUserStore};
    use crate::token::TokenConfig;
    use async_trait::async_trait;

    fn service_with(users: Arc<dyn UserStore>, timeout: Duration) -> AccountService {
        let tokens = TokenService::new(
            TokenConfig::default(),
            Arc::new(InMemoryTokenStore::new()),
        );
        AccountService::new(
            users,
            CredentialHasher::new(PasswordConfig::lightweight()),
            tokens,
            timeout,
        )
    }

    fn service() -> AccountService {
        service_with(Arc::new(InMemoryUserStore::new()), Duration::from_secs(2))
    }

    #[tokio::test]
    async fn test_register() {
        let accounts = service();
        let user = accounts
            .register(NewUser::new("jack", "QWEqwe123!!@#", "940217450216"))
            .await
            .unwrap();

        assert_eq!(user.username, "jack");
        assert_eq!(user.role, Role::User);
        assert_ne!(user.password_hash, "QWEqwe123!!@#");

        let stored = accounts.get_by_username("jack").await.unwrap();
        assert_eq!(stored.id, user.id);
    }

    #[tokio::test]
    async fn test_register_duplicate_national_id() {
        let accounts = service();
        accounts
            .register(NewUser::new("jack", "QWEqwe123!!@#", "940217450216"))
            .await
            .unwrap();

        let result = accounts
            .register(NewUser::new("other", "QWEqwe123!!@#", "940217450216"))
            .await;
        assert!(matches!(result, Err(AccountError::DuplicateIdentity)));
    }

    #[tokio::test]
    async fn test_register_duplicate_username() {
        let accounts = service();
        accounts
            .register(NewUser::new("jack", "QWEqwe123!!@#", "940217450216"))
            .await
            .unwrap();

        let result = accounts
            .register(NewUser::new("jack", "QWEqwe123!!@#", "990824351277"))
            .await;
        assert!(matches!(result, Err(AccountError::DuplicateIdentity)));
    }

    #[tokio::test]
    async fn test_register_invalid_identity() {
        let accounts = service();
        let result = accounts
            .register(NewUser::new("jack", "asdasad", "940217450216"))
            .await;
        assert!(matches!(
            result,
            Err(AccountError::Validation(ValidationError::WeakPassword))
        ));

        // Nothing was persisted
        assert!(accounts.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_authenticate_failures_look_alike() {
        let accounts = service();
        accounts
            .register(NewUser::new("jack", "QWEqwe123!!@#", "940217450216"))
            .await
            .unwrap();

        let wrong_password = accounts.authenticate("jack", "QWEqwe123!!@").await;
        let unknown_user = accounts.authenticate("ghost", "QWEqwe123!!@#").await;

        assert!(matches!(wrong_password, Err(AccountError::BadCredentials)));
        assert!(matches!(unknown_user, Err(AccountError::BadCredentials)));
    }

    #[tokio::test]
    async fn test_upgrade_role_requires_admin() {
        let accounts = service();

        // Rejected before the target is even looked up
        let result = accounts.upgrade_role(Role::User, "ghost").await;
        assert!(matches!(result, Err(AccountError::Forbidden)));
    }

    #[tokio::test]
    async fn test_upgrade_role() {
        let accounts = service();
        accounts
            .register(NewUser::new("jack", "QWEqwe123!!@#", "940217450216"))
            .await
            .unwrap();

        let missing = accounts.upgrade_role(Role::Admin, "ghost").await;
        assert!(matches!(missing, Err(AccountError::NotFound)));

        let upgraded = accounts.upgrade_role(Role::Admin, "jack").await.unwrap();
        assert_eq!(upgraded.role, Role::Admin);
        assert!(accounts.get_by_username("jack").await.unwrap().is_admin());
    }

    #[tokio::test]
    async fn test_lookups_map_not_found() {
        let accounts = service();
        assert!(matches!(
            accounts.get_by_id(99).await,
            Err(AccountError::NotFound)
        ));
        assert!(matches!(
            accounts.get_by_national_id("940217450216").await,
            Err(AccountError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_ensure_admin_is_idempotent() {
        let accounts = service();
        let admin = BootstrapAdmin {
            username: "admin".to_string(),
            password: "Admin123!".to_string(),
            national_id: "990824351277".to_string(),
        };

        let created = accounts.ensure_admin(&admin).await.unwrap();
        assert_eq!(created.map(|u| u.role), Some(Role::Admin));

        assert!(accounts.ensure_admin(&admin).await.unwrap().is_none());
        assert_eq!(accounts.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let accounts = service();
        let gate = AuthorizationGate::new(accounts.tokens().clone());

        let user = accounts
            .register(NewUser::new("jack", "QWEqwe123!!@#", "940217450216"))
            .await
            .unwrap();

        let first = accounts
            .authenticate("jack", "QWEqwe123!!@#")
            .await
            .unwrap();
        let ctx = gate.authorize(Some(&first.token)).await.unwrap();
        assert_eq!(ctx.subject_id, user.id);
        assert_eq!(ctx.role, Role::User);

        // A second sign-in supersedes the first session
        let second = accounts
            .authenticate("jack", "QWEqwe123!!@#")
            .await
            .unwrap();
        assert_eq!(
            gate.authorize(Some(&first.token)).await,
            Err(GateError::Unauthenticated)
        );
        assert!(gate.authorize(Some(&second.token)).await.is_ok());

        accounts.sign_out(user.id).await.unwrap();
        assert_eq!(
            gate.authorize(Some(&second.token)).await,
            Err(GateError::Unauthenticated)
        );
    }

    /// User store whose every call outlives any sane timeout
    struct StalledUserStore;

    #[async_trait]
    impl UserStore for StalledUserStore {
        async fn create(&self, _: CreateUser) -> Result<User, StoreError> {
            std::future::pending().await
        }
        async fn get_by_id(&self, _: i64) -> Result<User, StoreError> {
            std::future::pending().await
        }
        async fn get_by_username(&self, _: &str) -> Result<User, StoreError> {
            std::future::pending().await
        }
        async fn get_by_national_id(&self, _: &str) -> Result<User, StoreError> {
            std::future::pending().await
        }
        async fn list_all(&self) -> Result<Vec<User>, StoreError> {
            std::future::pending().await
        }
        async fn update_role(&self, _: &str, _: Role) -> Result<(), StoreError> {
            std::future::pending().await
        }
        fn name(&self) -> &str {
            "stalled"
        }
    }

    #[tokio::test]
    async fn test_store_calls_are_bounded() {
        let accounts = service_with(Arc::new(StalledUserStore), Duration::from_millis(20));

        assert!(matches!(
            accounts.authenticate("jack", "QWEqwe123!!@#").await,
            Err(AccountError::Timeout)
        ));
        assert!(matches!(
            accounts
                .register(NewUser::new("jack", "QWEqwe123!!@#", "940217450216"))
                .await,
            Err(AccountError::Timeout)
        ));
    }

    struct FailingUserStore;

    #[async_trait]
    impl UserStore for FailingUserStore {
        async fn create(&self, _: CreateUser) -> Result<User, StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }
        async fn get_by_id(&self, _: i64) -> Result<User, StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }
        async fn get_by_username(&self, _: &str) -> Result<User, StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }
        async fn get_by_national_id(&self, _: &str) -> Result<User, StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }
        async fn list_all(&self) -> Result<Vec<User>, StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }
        async fn update_role(&self, _: &str, _: Role) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }
        fn name(&self) -> &str {
            "failing"
        }
    }

    #[tokio::test]
    async fn test_store_failure_is_persistence_error() {
        let accounts = service_with(Arc::new(FailingUserStore), Duration::from_secs(1));

        assert!(matches!(
            accounts.list_all().await,
            Err(AccountError::Persistence(StoreError::Unavailable(_)))
        ));
        assert!(matches!(
            accounts.authenticate("jack", "QWEqwe123!!@#").await,
            Err(AccountError::Persistence(_))
        ));
    }
}
