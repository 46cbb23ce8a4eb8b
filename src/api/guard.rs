// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request-time route guard.
//!
//! Presence-only: the token is not validated here. Authenticity is checked
//! by the auth reconciler once the page is running.

use axum::{
    extract::Request,
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use tracing::debug;

use crate::config::{DASHBOARD_PATH, LOGIN_PATH};
use crate::session::TOKEN_COOKIE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Continue,
    Redirect(&'static str),
}

/// `/dashboard` and everything below it.
pub fn is_protected(path: &str) -> bool {
    path == DASHBOARD_PATH
        || path
            .strip_prefix(DASHBOARD_PATH)
            .is_some_and(|rest| rest.starts_with('/'))
}

pub fn decide(path: &str, has_token: bool) -> GuardDecision {
    if !has_token && is_protected(path) {
        GuardDecision::Redirect(LOGIN_PATH)
    } else if has_token && path == LOGIN_PATH {
        GuardDecision::Redirect(DASHBOARD_PATH)
    } else {
        GuardDecision::Continue
    }
}

/// Token from the `token` cookie, falling back to `Authorization: Bearer`.
pub fn request_token(jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    if let Some(cookie) = jar.get(TOKEN_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// Guard middleware for the page routes.
pub async fn route_guard(jar: CookieJar, request: Request, next: Next) -> Response {
    let has_token = request_token(&jar, request.headers()).is_some();

    match decide(request.uri().path(), has_token) {
        GuardDecision::Continue => next.run(request).await,
        GuardDecision::Redirect(to) => {
            debug!(path = %request.uri().path(), to, has_token, "Route guard redirect");
            Redirect::temporary(to).into_response()
        }
    }
}
