// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Cache keys: normalized request URL plus optional identity scope.

use url::Url;

/// Key of a shared cache entry.
///
/// The scope is the lower-cased wallet address of the session the request
/// was made for; entries with a scope are dropped on logout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    scope: Option<String>,
    url: String,
}

impl CacheKey {
    /// Key for data that does not depend on who is logged in.
    pub fn public(url: &str) -> Self {
        Self {
            scope: None,
            url: normalize_url(url),
        }
    }

    /// Key for data fetched on behalf of `scope`.
    pub fn scoped(url: &str, scope: &str) -> Self {
        Self {
            scope: Some(scope.to_lowercase()),
            url: normalize_url(url),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    pub fn is_auth_scoped(&self) -> bool {
        self.scope.is_some()
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.scope {
            Some(scope) => write!(f, "{scope}@{}", self.url),
            None => write!(f, "{}", self.url),
        }
    }
}

/// Normalize a request URL so equivalent requests share one entry.
///
/// Scheme and host are lower-cased and default ports dropped (by `Url`),
/// the fragment is removed, query pairs are sorted and a trailing slash on
/// a non-root path is trimmed. Unparsable input is only trimmed.
pub fn normalize_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw.trim()) else {
        return raw.trim().to_string();
    };

    url.set_fragment(None);

    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if pairs.is_empty() {
        url.set_query(None);
    } else {
        pairs.sort();
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }

    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        url.set_path(path.trim_end_matches('/'));
    }

    url.to_string()
}
