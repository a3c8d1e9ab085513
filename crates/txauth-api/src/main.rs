//! txauth API Server
//!
//! Author: hephaex@gmail.com

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use txauth_api::{create_router, state::AppState};
use txauth_core::config::AppConfig;
use txauth_core::store::{self, InMemoryTokenStore, InMemoryUserStore, PgTokenStore, PgUserStore};
use txauth_core::{CredentialHasher, TokenStore, UserStore};

const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(600);

fn load_config() -> anyhow::Result<AppConfig> {
    let config = match std::env::var("CONFIG_FILE") {
        Ok(path) => AppConfig::from_file(&path)
            .with_context(|| format!("loading {path}"))?
            .with_env_override()?,
        Err(_) => AppConfig::from_env()?,
    };
    config.validate()?;
    Ok(config)
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "txauth_api=debug,txauth_core={},tower_http=info,audit=info",
            config.logging.level
        )
        .into()
    });

    if config.logging.json_format {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn build_stores(
    config: &AppConfig,
) -> anyhow::Result<(Arc<dyn UserStore>, Arc<dyn TokenStore>)> {
    if config.database.is_in_memory() {
        tracing::warn!("DATABASE_URL is empty; using in-memory stores, data is lost on restart");
        return Ok((
            Arc::new(InMemoryUserStore::new()),
            Arc::new(InMemoryTokenStore::new()),
        ));
    }

    let pool = store::postgres::connect(&config.database.url, config.database.pool_size).await?;
    store::postgres::ensure_schema(&pool).await?;
    tracing::info!(pool_size = config.database.pool_size, "connected to PostgreSQL");

    let tokens = PgTokenStore::from_pool(pool.clone());
    spawn_session_purge(tokens.clone());

    Ok((Arc::new(PgUserStore::from_pool(pool)), Arc::new(tokens)))
}

fn spawn_session_purge(tokens: PgTokenStore) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            match tokens.purge_expired().await {
                Ok(0) => {}
                Ok(removed) => tracing::debug!(removed, "purged expired sessions"),
                Err(e) => tracing::warn!(error = %e, "session purge failed"),
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    init_tracing(&config);

    if config.auth.uses_dev_secret() {
        tracing::warn!("JWT_SECRET not set; using the development signing secret");
    }

    let (users, tokens) = build_stores(&config).await?;
    let hasher = CredentialHasher::new(config.auth.password_config());
    let accounts_client = AppState::accounts_client_for(&config)?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let bootstrap_admin = config.auth.bootstrap_admin.clone();

    let state = Arc::new(AppState::new(
        config,
        users,
        tokens,
        hasher,
        accounts_client,
    ));

    if let Some(admin) = bootstrap_admin {
        match state.accounts.ensure_admin(&admin).await {
            Ok(Some(user)) => tracing::info!(user_id = user.id, "bootstrap admin created"),
            Ok(None) => tracing::debug!("bootstrap admin already present"),
            Err(e) => return Err(e).context("creating bootstrap admin"),
        }
    }

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("txauth API server starting on http://{}", addr);
    tracing::info!("OpenAPI document at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
