// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Client-side token expiry check.
//!
//! The backend signs tokens with a key the portal never sees, so this only
//! reads the `exp` claim without verifying the signature. It exists to drop
//! sessions that are certainly dead; it never makes a token more trusted.

use serde::Deserialize;

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: i64 = 60;

#[derive(Debug, Deserialize)]
struct ExpiryClaims {
    #[serde(default)]
    exp: Option<i64>,
}

/// What the portal can tell about a stored token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    /// JWT whose `exp` is in the future (or absent)
    Live,
    /// JWT whose `exp` passed more than the leeway ago
    Expired,
    /// Not a decodable JWT; only the backend can judge it
    Opaque,
}

/// Inspect `token` against the Unix time `now`.
pub fn inspect(token: &str, now: i64) -> TokenStatus {
    if token.split('.').count() != 3 {
        return TokenStatus::Opaque;
    }

    match jsonwebtoken::dangerous::insecure_decode::<ExpiryClaims>(token) {
        Ok(data) => match data.claims.exp {
            Some(exp) if exp > 0 && exp < now - CLOCK_SKEW_LEEWAY => TokenStatus::Expired,
            _ => TokenStatus::Live,
        },
        Err(_) => TokenStatus::Opaque,
    }
}

/// Inspect `token` against the current time.
pub fn inspect_now(token: &str) -> TokenStatus {
    inspect(token, chrono::Utc::now().timestamp())
}
