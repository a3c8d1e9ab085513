//! HTTP side of session authentication
//!
//! - Token carriers (bearer header and `access-token` cookie)
//! - Middleware running the authorization gate and the admin guard

pub mod cookie;
pub mod middleware;

pub use cookie::{extract_token, TokenSource, SESSION_COOKIE};
pub use middleware::{auth_middleware, require_admin, SessionToken};
