//! Application state management
//!
//! Author: hephaex@gmail.com

use crate::accounts_client::{AccountsClient, HttpAccountsClient, NoAccountsClient};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use txauth_core::config::AppConfig;
use txauth_core::store::{InMemoryTokenStore, InMemoryUserStore};
use txauth_core::{
    AccountService, AuthorizationGate, CredentialHasher, TokenService, TokenStore, UserStore,
};

/// Per-endpoint request statistics
#[derive(Debug, Default, Clone)]
pub struct EndpointMetrics {
    pub status_counts: HashMap<u16, u64>,
    pub latency_count: u64,
    pub total_latency_us: u64,
    pub max_latency_us: u64,
}

impl EndpointMetrics {
    fn record(&mut self, status: u16, latency_us: u64) {
        *self.status_counts.entry(status).or_insert(0) += 1;
        self.latency_count += 1;
        self.total_latency_us += latency_us;
        self.max_latency_us = self.max_latency_us.max(latency_us);
    }
}

/// Sign-in outcome counters
#[derive(Debug, Default)]
pub struct AuthCounters {
    pub login_success: AtomicU64,
    pub login_failure: AtomicU64,
    pub gate_rejections: AtomicU64,
}

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Account use cases
    pub accounts: AccountService,
    /// Session check for gated routes
    pub gate: AuthorizationGate,
    /// Downstream accounts service
    pub accounts_client: Arc<dyn AccountsClient>,
    /// Name of the storage backend in use
    pub store_backend: String,
    /// Server start time
    pub start_time: Instant,
    /// Request counter
    pub request_count: AtomicU64,
    /// Ready status
    pub is_ready: AtomicBool,
    /// Sign-in and gate counters
    pub auth_counters: AuthCounters,
    /// Per-endpoint metrics keyed by route template
    pub metrics: RwLock<HashMap<String, EndpointMetrics>>,
}

impl AppState {
    /// Wire the use cases over the given stores
    pub fn new(
        config: AppConfig,
        users: Arc<dyn UserStore>,
        tokens: Arc<dyn TokenStore>,
        hasher: CredentialHasher,
        accounts_client: Arc<dyn AccountsClient>,
    ) -> Self {
        let store_backend = users.name().to_string();
        let token_service = TokenService::new(config.auth.token_config(), tokens);
        let accounts = AccountService::new(
            users,
            hasher,
            token_service.clone(),
            config.auth.request_timeout(),
        );

        Self {
            config,
            accounts,
            gate: AuthorizationGate::new(token_service),
            accounts_client,
            store_backend,
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
            is_ready: AtomicBool::new(true),
            auth_counters: AuthCounters::default(),
            metrics: RwLock::new(HashMap::new()),
        }
    }

    /// State over in-memory stores
    pub fn in_memory(config: AppConfig, accounts_client: Arc<dyn AccountsClient>) -> Self {
        let hasher = CredentialHasher::new(config.auth.password_config());
        Self::new(
            config,
            Arc::new(InMemoryUserStore::new()),
            Arc::new(InMemoryTokenStore::new()),
            hasher,
            accounts_client,
        )
    }

    /// Accounts client for the configured base URL; none when it is empty
    pub fn accounts_client_for(
        config: &AppConfig,
    ) -> Result<Arc<dyn AccountsClient>, crate::accounts_client::AccountsClientError> {
        if config.accounts.base_url.trim().is_empty() {
            return Ok(Arc::new(NoAccountsClient));
        }
        let client =
            HttpAccountsClient::new(&config.accounts.base_url, config.auth.request_timeout())?;
        Ok(Arc::new(client))
    }

    /// Increment request counter
    pub fn increment_requests(&self) -> u64 {
        self.request_count.fetch_add(1, Ordering::SeqCst)
    }

    /// Get total request count
    pub fn get_request_count(&self) -> u64 {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Check if service is ready
    pub fn is_ready(&self) -> bool {
        self.is_ready.load(Ordering::SeqCst)
    }

    /// Set ready status
    pub fn set_ready(&self, ready: bool) {
        self.is_ready.store(ready, Ordering::SeqCst);
    }

    pub fn record_login(&self, success: bool) {
        let counter = if success {
            &self.auth_counters.login_success
        } else {
            &self.auth_counters.login_failure
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_gate_rejection(&self) {
        self.auth_counters
            .gate_rejections
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Record one finished request
    pub async fn record_request(&self, endpoint: String, status: u16, latency_us: u64) {
        self.increment_requests();
        self.metrics
            .write()
            .await
            .entry(endpoint)
            .or_default()
            .record(status, latency_us);
    }
}
