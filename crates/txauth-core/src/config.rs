//! txauth Configuration Management
//!
//! Handles configuration from environment variables and TOML files with
//! sensible defaults for development.

use crate::password::PasswordConfig;
use crate::token::TokenConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// User and session storage
    pub database: DatabaseConfig,

    /// Session tokens and sign-in
    pub auth: AuthConfig,

    /// Downstream accounts service
    pub accounts: AccountsConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_override()
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server
        if let Some(host) = lookup("API_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("API_PORT") {
            self.server.port = parse_value("API_PORT", port)?;
        }

        // Database
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(size) = lookup("DATABASE_POOL_SIZE") {
            self.database.pool_size = parse_value("DATABASE_POOL_SIZE", size)?;
        }

        // Auth
        if let Some(secret) = lookup("JWT_SECRET") {
            self.auth.signing_secret = secret;
        }
        if let Some(ttl) = lookup("JWT_ACCESS_TTL_SECS") {
            self.auth.access_ttl_secs = parse_value("JWT_ACCESS_TTL_SECS", ttl)?;
        }
        if let Some(timeout) = lookup("REQUEST_TIMEOUT_MS") {
            self.auth.request_timeout_ms = parse_value("REQUEST_TIMEOUT_MS", timeout)?;
        }
        if let Some(redirect) = lookup("AUTH_LOGIN_REDIRECT") {
            self.auth.login_redirect = Some(redirect).filter(|r| !r.is_empty());
        }
        if let Some(secure) = lookup("AUTH_SECURE_COOKIE") {
            self.auth.secure_cookie = parse_value("AUTH_SECURE_COOKIE", secure)?;
        }

        // Bootstrap admin only when all three are present
        if let (Some(username), Some(password), Some(national_id)) = (
            lookup("ADMIN_USERNAME"),
            lookup("ADMIN_PASSWORD"),
            lookup("ADMIN_IIN"),
        ) {
            self.auth.bootstrap_admin = Some(BootstrapAdmin {
                username,
                password,
                national_id,
            });
        }

        // Accounts service
        if let Some(url) = lookup("ACCOUNTS_SERVICE_URL") {
            self.accounts.base_url = url;
        }

        // Logging
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("LOG_FORMAT") {
            self.logging.json_format = match format.to_lowercase().as_str() {
                "json" => true,
                "pretty" | "text" => false,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "LOG_FORMAT".to_string(),
                        value: format,
                    })
                }
            };
        }

        Ok(self)
    }

    /// Check values that have no usable default
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.signing_secret.is_empty() {
            return Err(ConfigError::MissingRequired("JWT_SECRET".to_string()));
        }
        if self.auth.access_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "JWT_ACCESS_TTL_SECS".to_string(),
                value: "0".to_string(),
            });
        }
        if self.auth.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "REQUEST_TIMEOUT_MS".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Maximum request body size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_body_size: 64 * 1024,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL; empty selects the in-memory stores
    pub url: String,

    /// PostgreSQL connection pool size
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            pool_size: 10,
        }
    }
}

impl DatabaseConfig {
    pub fn is_in_memory(&self) -> bool {
        self.url.trim().is_empty()
    }
}

/// Development-only signing secret
pub const DEV_SIGNING_SECRET: &str = "development-secret-key-change-in-production";

/// Session and sign-in configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret for session tokens
    pub signing_secret: String,

    /// Session lifetime in seconds
    pub access_ttl_secs: u64,

    /// Bound on each store round trip, in milliseconds
    pub request_timeout_ms: u64,

    /// Mark the session cookie `Secure`
    pub secure_cookie: bool,

    /// Where to send cookie-carrying browsers whose session is rejected
    pub login_redirect: Option<String>,

    /// Admin account created at startup if missing
    pub bootstrap_admin: Option<BootstrapAdmin>,

    /// Argon2 memory cost in KB
    pub hash_memory_kb: u32,

    /// Argon2 iterations
    pub hash_iterations: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            signing_secret: DEV_SIGNING_SECRET.to_string(),
            access_ttl_secs: 3600,
            request_timeout_ms: 2000,
            secure_cookie: false,
            login_redirect: None,
            bootstrap_admin: None,
            hash_memory_kb: 65536,
            hash_iterations: 3,
        }
    }
}

impl AuthConfig {
    pub fn access_ttl(&self) -> Duration {
        Duration::from_secs(self.access_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.signing_secret == DEV_SIGNING_SECRET
    }

    pub fn token_config(&self) -> TokenConfig {
        TokenConfig {
            secret: self.signing_secret.clone(),
            access_ttl: self.access_ttl(),
            request_timeout: self.request_timeout(),
        }
    }

    pub fn password_config(&self) -> PasswordConfig {
        PasswordConfig {
            memory_cost: self.hash_memory_kb,
            time_cost: self.hash_iterations,
            ..Default::default()
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("signing_secret", &"<redacted>")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("secure_cookie", &self.secure_cookie)
            .field("login_redirect", &self.login_redirect)
            .field("bootstrap_admin", &self.bootstrap_admin)
            .field("hash_memory_kb", &self.hash_memory_kb)
            .field("hash_iterations", &self.hash_iterations)
            .finish()
    }
}

/// Admin credentials registered at startup
#[derive(Clone, Serialize, Deserialize)]
pub struct BootstrapAdmin {
    pub username: String,
    pub password: String,
    pub national_id: String,
}

impl fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("national_id", &self.national_id)
            .finish()
    }
}

/// Downstream accounts service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountsConfig {
    /// Base URL; empty disables account enrichment
    pub base_url: String,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8181".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
