//! The HTTP-only cookie that carries the refresh token between browser and server.

use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

pub(crate) const REFRESH_COOKIE: &str = "refresh_token";

/// Cookie holding `token` for `max_age_secs`. `secure` is off only in development so
/// the cookie still works over plain http on localhost.
pub(crate) fn refresh_cookie(token: &str, max_age_secs: u64, secure: bool) -> Cookie<'static> {
    let max_age = i64::try_from(max_age_secs).unwrap_or(i64::MAX);
    build(token.to_string(), Duration::seconds(max_age), secure)
}

/// Expired cookie that makes the browser forget the refresh token.
pub(crate) fn clear_refresh_cookie(secure: bool) -> Cookie<'static> {
    build(String::new(), Duration::ZERO, secure)
}

fn build(value: String, max_age: Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(max_age)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_cookie_attributes() {
        let cookie = refresh_cookie("abc", 604_800, true);

        assert_eq!(cookie.name(), REFRESH_COOKIE);
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(Duration::seconds(604_800)));
    }

    #[test]
    fn test_cleared_cookie_expires_immediately() {
        let cookie = clear_refresh_cookie(false);

        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(Duration::ZERO));
        assert_eq!(cookie.secure(), Some(false));
    }
}
