//! Session token issuance, validation and allow-listing
//!
//! Tokens are JWTs signed with HMAC-SHA256. A token authorizes a request only
//! when all three hold:
//! 1. the signature verifies with the server secret,
//! 2. `exp` has not passed,
//! 3. the exact token string is the one currently stored under the
//!    subject's key in the [`TokenStore`].
//!
//! The third check is what makes sign-out and re-sign-in effective before
//! `exp`: each subject has a single key, so a new sign-in overwrites the
//! previous token and the old one stops being accepted.

use crate::store::{StoreError, TokenStore};
use crate::Role;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

/// Claims embedded in a session token
///
/// Identity fields are optional at the type level so that a token missing
/// one of them still decodes and the caller gets a precise
/// [`TokenError::ClaimMissing`] from the extractors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - numeric user ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Role at issue time ("user" or "admin")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// National ID of the subject
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iin: Option<String>,
    /// Issued at (Unix seconds)
    pub iat: u64,
    /// Expiration (Unix seconds)
    pub exp: u64,
    /// Random token ID; keeps two tokens issued within the same second distinct
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

/// Token errors
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Malformed token")]
    MalformedToken,

    #[error("Token claim missing or invalid: {0}")]
    ClaimMissing(&'static str),

    #[error("Failed to encode token: {0}")]
    Encoding(String),

    #[error("Token store error: {0}")]
    Store(#[from] StoreError),

    #[error("Token store operation timed out")]
    Timeout,

    #[error("System time error: {0}")]
    SystemTime(#[from] std::time::SystemTimeError),
}

/// Token configuration
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// HMAC signing secret
    pub secret: String,
    /// Lifetime of an access token and of its allow-list entry
    pub access_ttl: Duration,
    /// Bound on every token store round trip
    pub request_timeout: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret: "development-secret-key-change-in-production".to_string(),
            access_ttl: Duration::from_secs(3600),
            request_timeout: Duration::from_secs(2),
        }
    }
}

/// Store key holding the active token of a subject
pub fn session_key(subject_id: i64) -> String {
    format!("user:{subject_id}")
}

/// Issues and checks session tokens
#[derive(Clone)]
pub struct TokenService {
    config: Arc<TokenConfig>,
    store: Arc<dyn TokenStore>,
}

impl TokenService {
    pub fn new(config: TokenConfig, store: Arc<dyn TokenStore>) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.config.access_ttl
    }

    /// Sign a new token for a subject
    ///
    /// Issuing has no side effects; call [`TokenService::insert`] to make the
    /// token acceptable to the allow-list check.
    pub fn issue(
        &self,
        subject_id: i64,
        role: Role,
        national_id: &str,
    ) -> Result<String, TokenError> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();

        let claims = Claims {
            id: Some(subject_id),
            role: Some(role.as_str().to_string()),
            iin: Some(national_id.to_string()),
            iat: now,
            exp: now + self.config.access_ttl.as_secs(),
            jti: Some(Uuid::new_v4().to_string()),
        };

        self.sign(&claims)
    }

    fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(self.config.secret.as_bytes()),
        )
        .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Record `token` as the single active token of `subject_id`
    ///
    /// Overwrites whatever was stored before (last write wins).
    pub async fn insert(&self, subject_id: i64, token: &str) -> Result<(), TokenError> {
        let key = session_key(subject_id);
        self.bounded(self.store.set(&key, token, self.config.access_ttl))
            .await?;
        tracing::debug!(subject_id, store = self.store.name(), "session token stored");
        Ok(())
    }

    /// Verify signature and expiry, returning the claims
    ///
    /// A token whose `exp` has passed is `TokenExpired` whether or not its
    /// signature verifies. Does not consult the store; see
    /// [`TokenService::is_allow_listed`].
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        let result = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.secret.as_bytes()),
            &validation,
        );

        match result {
            Ok(token_data) => Ok(token_data.claims),
            Err(e) => match e.kind() {
                ErrorKind::ExpiredSignature => Err(TokenError::TokenExpired),
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    if Self::has_expired(token)? {
                        Err(TokenError::TokenExpired)
                    } else {
                        Err(TokenError::InvalidSignature)
                    }
                }
                _ => Err(TokenError::MalformedToken),
            },
        }
    }

    /// Read `exp` without verifying the signature
    fn has_expired(token: &str) -> Result<bool, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
        let expired = decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
            .map(|data| data.claims.exp < now)
            .unwrap_or(false);

        Ok(expired)
    }

    /// Whether `token` is the one currently stored for `subject_id`
    ///
    /// A missing entry is `Ok(false)`; other store failures are errors.
    pub async fn is_allow_listed(&self, subject_id: i64, token: &str) -> Result<bool, TokenError> {
        let key = session_key(subject_id);
        match self.bounded(self.store.get(&key)).await {
            Ok(stored) => Ok(stored == token),
            Err(TokenError::Store(StoreError::NotFound)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Drop the active token of `subject_id`
    pub async fn revoke(&self, subject_id: i64) -> Result<(), TokenError> {
        let key = session_key(subject_id);
        self.bounded(self.store.delete(&key)).await?;
        tracing::debug!(subject_id, "session token revoked");
        Ok(())
    }

    pub fn extract_subject(claims: &Claims) -> Result<i64, TokenError> {
        claims.id.ok_or(TokenError::ClaimMissing("id"))
    }

    pub fn extract_role(claims: &Claims) -> Result<Role, TokenError> {
        claims
            .role
            .as_deref()
            .and_then(|r| r.parse().ok())
            .ok_or(TokenError::ClaimMissing("role"))
    }

    async fn bounded<T>(
        &self,
        op: impl std::future::Future<Output = Result<T, StoreError>>,
    ) -> Result<T, TokenError> {
        match tokio::time::timeout(self.config.request_timeout, op).await {
            Ok(result) => result.map_err(TokenError::from),
            Err(_) => Err(TokenError::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryTokenStore;

    fn service() -> TokenService {
        TokenService::new(TokenConfig::default(), Arc::new(InMemoryTokenStore::new()))
    }

    fn service_with_secret(secret: &str) -> TokenService {
        TokenService::new(
            TokenConfig {
                secret: secret.to_string(),
                ..Default::default()
            },
            Arc::new(InMemoryTokenStore::new()),
        )
    }

    fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    #[test]
    fn test_issue_and_validate() {
        let tokens = service();
        let token = tokens.issue(42, Role::Admin, "940217450216").unwrap();

        let claims = tokens.validate(&token).expect("Failed to validate token");

        assert_eq!(TokenService::extract_subject(&claims).unwrap(), 42);
        assert_eq!(TokenService::extract_role(&claims).unwrap(), Role::Admin);
        assert_eq!(claims.iin.as_deref(), Some("940217450216"));
        assert_eq!(claims.exp - claims.iat, 3600);
        assert!(claims.jti.is_some());
    }

    #[test]
    fn test_tokens_are_unique() {
        let tokens = service();
        let a = tokens.issue(1, Role::User, "940217450216").unwrap();
        let b = tokens.issue(1, Role::User, "940217450216").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_token() {
        let result = service().validate("invalid.token.here");
        assert!(matches!(result, Err(TokenError::MalformedToken)));
    }

    #[test]
    fn test_wrong_secret() {
        let token = service_with_secret("secret1")
            .issue(1, Role::User, "940217450216")
            .unwrap();

        let result = service_with_secret("secret2").validate(&token);
        assert!(matches!(result, Err(TokenError::InvalidSignature)));
    }

    #[test]
    fn test_unexpected_algorithm() {
        let tokens = service();
        let claims = Claims {
            id: Some(1),
            role: Some("user".to_string()),
            iin: None,
            iat: now(),
            exp: now() + 600,
            jti: None,
        };
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(TokenConfig::default().secret.as_bytes()),
        )
        .unwrap();

        assert!(matches!(
            tokens.validate(&token),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn test_expired_token() {
        let tokens = service();
        let claims = Claims {
            id: Some(1),
            role: Some("user".to_string()),
            iin: Some("940217450216".to_string()),
            iat: now() - 7200,
            exp: now() - 3600,
            jti: None,
        };
        let token = tokens.sign(&claims).unwrap();

        assert!(matches!(
            tokens.validate(&token),
            Err(TokenError::TokenExpired)
        ));
    }

    #[test]
    fn test_expired_token_with_foreign_signature() {
        let claims = Claims {
            id: Some(1),
            role: Some("admin".to_string()),
            iin: None,
            iat: now() - 7200,
            exp: now() - 3600,
            jti: None,
        };
        let forged = service_with_secret("attacker").sign(&claims).unwrap();

        assert!(matches!(
            service().validate(&forged),
            Err(TokenError::TokenExpired)
        ));

        let hs512 = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(b"attacker"),
        )
        .unwrap();
        assert!(matches!(
            service().validate(&hs512),
            Err(TokenError::TokenExpired)
        ));
    }

    #[test]
    fn test_unexpired_token_with_foreign_signature() {
        let claims = Claims {
            id: Some(1),
            role: Some("admin".to_string()),
            iin: None,
            iat: now(),
            exp: now() + 3600,
            jti: None,
        };
        let forged = service_with_secret("attacker").sign(&claims).unwrap();

        assert!(matches!(
            service().validate(&forged),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn test_missing_claims() {
        let tokens = service();
        let claims = Claims {
            id: None,
            role: Some("superuser".to_string()),
            iin: None,
            iat: now(),
            exp: now() + 600,
            jti: None,
        };
        let token = tokens.sign(&claims).unwrap();
        let decoded = tokens.validate(&token).unwrap();

        assert!(matches!(
            TokenService::extract_subject(&decoded),
            Err(TokenError::ClaimMissing("id"))
        ));
        assert!(matches!(
            TokenService::extract_role(&decoded),
            Err(TokenError::ClaimMissing("role"))
        ));
    }

    #[tokio::test]
    async fn test_allow_list_overwrite() {
        let tokens = service();
        let token_a = tokens.issue(7, Role::User, "940217450216").unwrap();
        let token_b = tokens.issue(7, Role::User, "940217450216").unwrap();

        assert!(!tokens.is_allow_listed(7, &token_a).await.unwrap());

        tokens.insert(7, &token_a).await.unwrap();
        assert!(tokens.is_allow_listed(7, &token_a).await.unwrap());

        tokens.insert(7, &token_b).await.unwrap();
        assert!(!tokens.is_allow_listed(7, &token_a).await.unwrap());
        assert!(tokens.is_allow_listed(7, &token_b).await.unwrap());
    }

    #[tokio::test]
    async fn test_allow_list_is_per_subject() {
        let tokens = service();
        let token = tokens.issue(1, Role::User, "940217450216").unwrap();
        tokens.insert(1, &token).await.unwrap();

        assert!(!tokens.is_allow_listed(2, &token).await.unwrap());
    }

    #[tokio::test]
    async fn test_revoke() {
        let tokens = service();
        let token = tokens.issue(3, Role::User, "940217450216").unwrap();
        tokens.insert(3, &token).await.unwrap();

        tokens.revoke(3).await.unwrap();
        assert!(!tokens.is_allow_listed(3, &token).await.unwrap());
        // The signature alone is still valid
        assert!(tokens.validate(&token).is_ok());
    }

    #[test]
    fn test_session_key_format() {
        assert_eq!(session_key(25), "user:25");
    }
}
