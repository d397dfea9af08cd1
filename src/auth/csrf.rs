use actix_web::{
    body::MessageBody,
    dev::{ServiceRequest, ServiceResponse},
    http::Method,
    middleware::Next,
    Error,
};
use log::warn;

use super::{tokens::constant_time_eq, CSRF_COOKIE, CSRF_HEADER};
use crate::error::ApiError;

/// Endpoints reachable before a CSRF cookie exists.
const EXEMPT_PATHS: &[&str] = &[
    "/api/auth/login",
    "/api/auth/register",
    "/api/auth/check-username",
    "/api/auth/check-email",
];

pub fn requires_csrf(method: &Method, path: &str) -> bool {
    if matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS) {
        return false;
    }
    let path = path.trim_end_matches('/');
    !EXEMPT_PATHS.contains(&path)
}

pub fn tokens_match(cookie: Option<&str>, header: Option<&str>) -> bool {
    match (cookie, header) {
        (Some(cookie), Some(header)) if !cookie.is_empty() => constant_time_eq(cookie, header),
        _ => false,
    }
}

/// Double-submit check: state-changing requests must echo the `csrf_token`
/// cookie in the `X-CSRF-Token` header.
pub async fn csrf_guard(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    if requires_csrf(req.method(), req.path()) {
        let cookie = req.cookie(CSRF_COOKIE).map(|c| c.value().to_string());
        let header = req
            .headers()
            .get(CSRF_HEADER)
            .and_then(|value| value.to_str().ok());

        if !tokens_match(cookie.as_deref(), header) {
            warn!("Rejected {} {} with missing or mismatched CSRF token", req.method(), req.path());
            return Err(ApiError::Csrf.into());
        }
    }
    next.call(req).await
}
