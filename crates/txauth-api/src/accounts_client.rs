//! Client for the downstream accounts service
//!
//! Fetches bank accounts belonging to a national ID. The caller's session
//! token is forwarded as the `access-token` cookie so the accounts service
//! can authorize the request itself.
//!
//! Author: hephaex@gmail.com

use crate::auth::cookie::SESSION_COOKIE;
use async_trait::async_trait;
use reqwest::{header, StatusCode};
use std::time::Duration;
use thiserror::Error;
use txauth_core::Account;

/// Accounts service errors
#[derive(Debug, Error)]
pub enum AccountsClientError {
    #[error("Accounts service request failed: {0}")]
    Transport(String),

    #[error("Accounts service timed out")]
    Timeout,

    #[error("Failed to decode accounts response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for AccountsClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AccountsClientError::Timeout
        } else if err.is_decode() {
            AccountsClientError::Decode(err.to_string())
        } else {
            AccountsClientError::Transport(err.to_string())
        }
    }
}

#[async_trait]
pub trait AccountsClient: Send + Sync {
    /// Accounts owned by `national_id`; empty when the service has none to report
    async fn accounts_for(
        &self,
        national_id: &str,
        session_token: &str,
    ) -> Result<Vec<Account>, AccountsClientError>;
}

/// HTTP implementation over reqwest
#[derive(Clone)]
pub struct HttpAccountsClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpAccountsClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AccountsClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AccountsClientError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn info_url(&self, national_id: &str) -> String {
        format!("{}/account/info/{}", self.base_url, national_id)
    }
}

#[async_trait]
impl AccountsClient for HttpAccountsClient {
    async fn accounts_for(
        &self,
        national_id: &str,
        session_token: &str,
    ) -> Result<Vec<Account>, AccountsClientError> {
        let response = self
            .http
            .get(self.info_url(national_id))
            .header(header::COOKIE, format!("{SESSION_COOKIE}={session_token}"))
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            tracing::info!(status = status.as_u16(), "accounts service reported no accounts");
            return Ok(Vec::new());
        }

        let accounts = response.json::<Vec<Account>>().await?;
        Ok(accounts)
    }
}

/// Used when no accounts service is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAccountsClient;

#[async_trait]
impl AccountsClient for NoAccountsClient {
    async fn accounts_for(&self, _: &str, _: &str) -> Result<Vec<Account>, AccountsClientError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Path, http::HeaderMap, routing::get, Json, Router};

    async fn account_info(Path(iin): Path<String>, headers: HeaderMap) -> axum::response::Response {
        use axum::response::IntoResponse;

        let cookie = headers
            .get(header::COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if cookie != "access-token=session-token" {
            return axum::http::StatusCode::FORBIDDEN.into_response();
        }

        match iin.as_str() {
            "940217450216" => Json(vec![Account {
                number: "KZ0001".to_string(),
                balance: 1500,
                register_date: "2021-01-01".to_string(),
                last_transaction: "2021-02-01".to_string(),
            }])
            .into_response(),
            "990824351277" => "not json".into_response(),
            _ => axum::http::StatusCode::NOT_FOUND.into_response(),
        }
    }

    async fn spawn_accounts_service() -> String {
        let app = Router::new().route("/account/info/:iin", get(account_info));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_fetches_accounts_with_cookie() {
        let base = spawn_accounts_service().await;
        let client = HttpAccountsClient::new(base, Duration::from_secs(2)).unwrap();

        let accounts = client
            .accounts_for("940217450216", "session-token")
            .await
            .unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].number, "KZ0001");
        assert_eq!(accounts[0].balance, 1500);
    }

    #[tokio::test]
    async fn test_non_ok_status_means_no_accounts() {
        let base = spawn_accounts_service().await;
        let client = HttpAccountsClient::new(base, Duration::from_secs(2)).unwrap();

        let unknown = client
            .accounts_for("000000300005", "session-token")
            .await
            .unwrap();
        assert!(unknown.is_empty());

        let rejected = client
            .accounts_for("940217450216", "wrong-token")
            .await
            .unwrap();
        assert!(rejected.is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_body() {
        let base = spawn_accounts_service().await;
        let client = HttpAccountsClient::new(base, Duration::from_secs(2)).unwrap();

        let result = client.accounts_for("990824351277", "session-token").await;
        assert!(matches!(result, Err(AccountsClientError::Decode(_))));
    }

    #[tokio::test]
    async fn test_unreachable_service() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client =
            HttpAccountsClient::new(format!("http://{addr}"), Duration::from_secs(2)).unwrap();
        let result = client.accounts_for("940217450216", "session-token").await;
        assert!(result.is_err());
    }

    #[test]
    fn test_info_url() {
        let client =
            HttpAccountsClient::new("http://localhost:8181/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.info_url("940217450216"),
            "http://localhost:8181/account/info/940217450216"
        );
    }
}
