//! Session cookie transport
//!
//! Both cookies share one base policy; the refresh cookie additionally goes
//! through a [`SignedCookieJar`] keyed by the cookie secret.

use axum_extra::extract::cookie::{Cookie, CookieJar, Key, SameSite, SignedCookieJar};
use sha2::{Digest, Sha512};

use crate::config::SessionTimings;

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";

/// Derive the 64-byte cookie signing key from an arbitrary-length secret.
pub fn cookie_key(secret: &str) -> Key {
    let digest = Sha512::digest(secret.as_bytes());
    Key::from(digest.as_slice())
}

/// Security attributes and lifetimes applied to the session cookies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookiePolicy {
    pub secure: bool,
    pub access_max_age_seconds: i64,
    pub refresh_max_age_seconds: i64,
}

impl CookiePolicy {
    pub fn new(secure: bool, timings: &SessionTimings) -> Self {
        Self {
            secure,
            access_max_age_seconds: timings.access_ttl_seconds,
            refresh_max_age_seconds: timings.refresh_ttl_seconds,
        }
    }

    fn base(&self, name: &'static str, value: String, max_age_seconds: i64) -> Cookie<'static> {
        Cookie::build((name, value))
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Strict)
            .path("/")
            .max_age(time::Duration::seconds(max_age_seconds))
            .build()
    }

    pub fn access_cookie(&self, token: String) -> Cookie<'static> {
        self.base(ACCESS_COOKIE, token, self.access_max_age_seconds)
    }

    pub fn refresh_cookie(&self, token: String) -> Cookie<'static> {
        self.base(REFRESH_COOKIE, token, self.refresh_max_age_seconds)
    }

    /// Removal cookie; path must match the one the cookie was set with.
    fn removal(&self, name: &'static str) -> Cookie<'static> {
        Cookie::build((name, "")).path("/").build()
    }

    /// Place the access token on the plain jar.
    pub fn write_access(&self, jar: CookieJar, token: String) -> CookieJar {
        jar.add(self.access_cookie(token))
    }

    /// Place the refresh token on the signed jar.
    pub fn write_refresh(&self, jar: SignedCookieJar, token: String) -> SignedCookieJar {
        jar.add(self.refresh_cookie(token))
    }

    pub fn clear(&self, jar: CookieJar, signed: SignedCookieJar) -> (CookieJar, SignedCookieJar) {
        (
            jar.remove(self.removal(ACCESS_COOKIE)),
            signed.remove(self.removal(REFRESH_COOKIE)),
        )
    }
}

/// Access token from the request, if any.
pub fn read_access(jar: &CookieJar) -> Option<String> {
    jar.get(ACCESS_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

/// Refresh token from the request. Cookies whose signature does not verify are absent.
pub fn read_refresh(jar: &SignedCookieJar) -> Option<String> {
    jar.get(REFRESH_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderMap, HeaderValue};
    use axum::response::IntoResponse;

    fn policy(secure: bool) -> CookiePolicy {
        CookiePolicy::new(secure, &SessionTimings::default())
    }

    #[test]
    fn test_access_cookie_attributes() {
        let rendered = policy(false).access_cookie("abc".to_string()).to_string();

        assert!(rendered.starts_with("access_token=abc"));
        assert!(rendered.contains("HttpOnly"));
        assert!(rendered.contains("SameSite=Strict"));
        assert!(rendered.contains("Path=/"));
        assert!(rendered.contains("Max-Age=900"));
        assert!(!rendered.contains("Secure"));
    }

    #[test]
    fn test_refresh_cookie_is_secure_in_production() {
        let rendered = policy(true).refresh_cookie("abc".to_string()).to_string();

        assert!(rendered.contains("Secure"));
        assert!(rendered.contains("Max-Age=604800"));
    }

    #[test]
    fn test_signed_refresh_cookie_round_trip() {
        let key = cookie_key("cookie-secret");
        let jar = policy(false).write_refresh(SignedCookieJar::new(key.clone()), "tok".to_string());

        // Replay the Set-Cookie value as a request header under the same key
        let response = jar.into_response();
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        let pair = set_cookie.split(';').next().unwrap().to_string();

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(&pair).unwrap());
        let incoming = SignedCookieJar::from_headers(&headers, key);
        assert_eq!(read_refresh(&incoming).as_deref(), Some("tok"));

        let other = SignedCookieJar::from_headers(&headers, cookie_key("other-secret"));
        assert_eq!(read_refresh(&other), None);
    }

    #[test]
    fn test_tampered_refresh_cookie_is_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("refresh_token=forged-value"),
        );
        let jar = SignedCookieJar::from_headers(&headers, cookie_key("cookie-secret"));
        assert_eq!(read_refresh(&jar), None);
    }

    #[test]
    fn test_empty_access_cookie_is_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("access_token="));
        let jar = CookieJar::from_headers(&headers);
        assert_eq!(read_access(&jar), None);
    }
}
