//! Cookie sessions, refresh-token rotation and CSRF protection.
//!
//! Three cookies are in play:
//! - `session_id`: short-lived access session, HttpOnly
//! - `refresh_token`: long-lived rotation token, HttpOnly, scoped to `/api/auth`
//! - `csrf_token`: readable by the client, echoed back in `X-CSRF-Token`

pub mod cookies;
pub mod csrf;
pub mod extractor;
pub mod password;
pub mod tokens;

pub use extractor::AuthUser;

pub const SESSION_COOKIE: &str = "session_id";
pub const REFRESH_COOKIE: &str = "refresh_token";
pub const CSRF_COOKIE: &str = "csrf_token";
pub const CSRF_HEADER: &str = "X-CSRF-Token";
