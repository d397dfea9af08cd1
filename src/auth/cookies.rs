use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use chrono::Duration;

use super::{CSRF_COOKIE, REFRESH_COOKIE, SESSION_COOKIE};

const REFRESH_PATH: &str = "/api/auth";

fn max_age(ttl: Duration) -> CookieDuration {
    CookieDuration::seconds(ttl.num_seconds())
}

pub fn session_cookie(session_id: String, ttl: Duration, secure: bool) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, session_id)
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(max_age(ttl))
        .finish()
}

pub fn refresh_cookie(token: String, ttl: Duration, secure: bool) -> Cookie<'static> {
    Cookie::build(REFRESH_COOKIE, token)
        .path(REFRESH_PATH)
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .max_age(max_age(ttl))
        .finish()
}

/// Not HttpOnly: the client reads it and echoes it in the CSRF header.
pub fn csrf_cookie(token: String, ttl: Duration, secure: bool) -> Cookie<'static> {
    Cookie::build(CSRF_COOKIE, token)
        .path("/")
        .http_only(false)
        .secure(secure)
        .same_site(SameSite::Strict)
        .max_age(max_age(ttl))
        .finish()
}

/// Expired copies of all three cookies, for logout and failed refresh.
pub fn removal_cookies() -> Vec<Cookie<'static>> {
    [(SESSION_COOKIE, "/"), (REFRESH_COOKIE, REFRESH_PATH), (CSRF_COOKIE, "/")]
        .into_iter()
        .map(|(name, path)| {
            let mut cookie = Cookie::build(name, "").path(path).finish();
            cookie.make_removal();
            cookie
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_is_http_only() {
        let cookie = session_cookie("abc".into(), Duration::minutes(30), true);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.max_age(), Some(CookieDuration::minutes(30)));
    }

    #[test]
    fn refresh_cookie_is_scoped_to_auth_routes() {
        let cookie = refresh_cookie("abc".into(), Duration::days(10), false);
        assert_eq!(cookie.path(), Some(REFRESH_PATH));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
    }

    #[test]
    fn csrf_cookie_is_readable_by_scripts() {
        let cookie = csrf_cookie("abc".into(), Duration::days(1), false);
        assert_eq!(cookie.http_only(), Some(false));
    }

    #[test]
    fn removal_cookies_expire_everything() {
        let cookies = removal_cookies();
        assert_eq!(cookies.len(), 3);
        assert!(cookies.iter().all(|c| c.max_age() == Some(CookieDuration::ZERO)));
    }
}
