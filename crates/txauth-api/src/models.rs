//! Request and response bodies
//!
//! Author: hephaex@gmail.com

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use txauth_core::{Account, User};
use utoipa::ToSchema;

/// Registration request
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    /// Lowercase letters and digits
    pub username: String,
    /// At least 6 characters with a digit, an uppercase and a lowercase letter
    pub password: String,
    /// 12-digit national identification number
    pub iin: String,
}

/// Sign-in request
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Successful sign-in
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    /// Lifetime in seconds
    pub expires_in: u64,
    pub user: UserView,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Public view of a user; never carries the password hash
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserView {
    pub id: i64,
    pub username: String,
    pub iin: String,
    pub role: String,
    pub registered_at: DateTime<Utc>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            iin: user.national_id,
            role: user.role.to_string(),
            registered_at: user.registered_at,
        }
    }
}

/// Bank account as reported by the accounts service
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccountView {
    pub number: String,
    pub balance: i64,
    #[serde(rename = "registerDate")]
    pub register_date: String,
    #[serde(rename = "lasttransaction")]
    pub last_transaction: String,
}

impl From<Account> for AccountView {
    fn from(account: Account) -> Self {
        Self {
            number: account.number,
            balance: account.balance,
            register_date: account.register_date,
            last_transaction: account.last_transaction,
        }
    }
}

/// A user together with its accounts
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserInfo {
    #[serde(flatten)]
    pub user: UserView,
    pub accounts: Vec<AccountView>,
}

impl UserInfo {
    pub fn new(user: User, accounts: Vec<Account>) -> Self {
        Self {
            user: user.into(),
            accounts: accounts.into_iter().map(AccountView::from).collect(),
        }
    }
}
