// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Client-side cookie jar mirroring the session for the route guard.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use cookie::time::{self, OffsetDateTime};
use cookie::{Cookie, CookieJar};

/// Cookie jar holding the entries the server-side guard reads.
#[derive(Debug, Default)]
pub struct SessionCookies {
    jar: Mutex<CookieJar>,
}

impl SessionCookies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a cookie expiring `max_age` from now.
    pub fn set(&self, name: &str, value: &str, max_age: Duration) {
        let max_age = time::Duration::try_from(max_age).unwrap_or(time::Duration::ZERO);
        let cookie = Cookie::build((name.to_string(), value.to_string()))
            .path("/")
            .max_age(max_age)
            .expires(OffsetDateTime::now_utc() + max_age)
            .build();
        self.lock().add(cookie);
    }

    /// Get a live cookie value. Expired cookies are purged on read.
    pub fn get(&self, name: &str) -> Option<String> {
        let mut jar = self.lock();
        let cookie = jar.get(name)?;
        if is_live(cookie) {
            return Some(cookie.value().to_string());
        }
        jar.remove(Cookie::from(name.to_string()));
        None
    }

    pub fn remove(&self, name: &str) {
        self.lock().remove(Cookie::from(name.to_string()));
    }

    /// Render the live cookies as a `Cookie` request header value.
    /// Values are percent-encoded.
    pub fn header_value(&self) -> Option<String> {
        let jar = self.lock();
        let mut pairs: Vec<String> = jar
            .iter()
            .filter(|cookie| is_live(cookie))
            .map(|cookie| cookie.encoded().stripped().to_string())
            .collect();
        pairs.sort();

        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }

    fn lock(&self) -> MutexGuard<'_, CookieJar> {
        self.jar.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn is_live(cookie: &Cookie<'_>) -> bool {
    cookie
        .expires_datetime()
        .is_none_or(|at| at > OffsetDateTime::now_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header::COOKIE, HeaderMap, HeaderValue};

    fn parse(header: &str) -> axum_extra::extract::CookieJar {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(header).unwrap());
        axum_extra::extract::CookieJar::from_headers(&headers)
    }

    #[test]
    fn set_get_remove() {
        let jar = SessionCookies::new();
        jar.set("token", "abc", Duration::from_secs(60));
        assert_eq!(jar.get("token").as_deref(), Some("abc"));

        jar.remove("token");
        assert_eq!(jar.get("token"), None);
    }

    #[test]
    fn expired_cookie_is_not_returned() {
        let jar = SessionCookies::new();
        jar.set("token", "abc", Duration::ZERO);
        assert_eq!(jar.get("token"), None);
        assert_eq!(jar.header_value(), None);
    }

    #[test]
    fn header_value_joins_live_cookies() {
        let jar = SessionCookies::new();
        jar.set("walletConnected", "true", Duration::from_secs(60));
        jar.set("token", "abc", Duration::from_secs(60));
        assert_eq!(
            jar.header_value().as_deref(),
            Some("token=abc; walletConnected=true")
        );
    }

    #[test]
    fn separators_in_values_are_encoded() {
        let jar = SessionCookies::new();
        jar.set("token", "abc; walletConnected=false", Duration::from_secs(60));
        jar.set("walletConnected", "true", Duration::from_secs(60));

        let header = jar.header_value().unwrap();
        assert!(!header.contains("walletConnected=false"));

        let parsed = parse(&header);
        assert_eq!(
            parsed.get("token").map(|c| c.value().to_string()).as_deref(),
            Some("abc; walletConnected=false")
        );
        assert_eq!(
            parsed.get("walletConnected").map(|c| c.value()),
            Some("true")
        );
    }
}
