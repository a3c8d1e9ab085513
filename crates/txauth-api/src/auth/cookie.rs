//! Session token carriers
//!
//! The canonical carrier is `Authorization: Bearer <token>`. Browsers get the
//! same token in the `access-token` cookie, which expires together with the
//! session.

use axum::http::{header, HeaderMap};
use chrono::{DateTime, Utc};

pub const SESSION_COOKIE: &str = "access-token";

/// Where a presented token was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Header,
    Cookie,
}

/// Token from the `Authorization` header, falling back to the session cookie
pub fn extract_token(headers: &HeaderMap) -> Option<(String, TokenSource)> {
    if let Some(token) = bearer_token(headers) {
        return Some((token, TokenSource::Header));
    }
    cookie_token(headers).map(|token| (token, TokenSource::Cookie))
}

/// Token of an `Authorization` header whose scheme is `Bearer` in any case
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

pub fn cookie_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// `Set-Cookie` value carrying a fresh session token
pub fn session_cookie(token: &str, expires_at: DateTime<Utc>, secure: bool) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}={token}; Expires={}; Path=/; HttpOnly; SameSite=Lax",
        http_date(expires_at)
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that makes the browser drop the session cookie
pub fn cleared_session_cookie(secure: bool) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}=; Expires={}; Max-Age=0; Path=/; HttpOnly; SameSite=Lax",
        http_date(DateTime::<Utc>::default())
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
