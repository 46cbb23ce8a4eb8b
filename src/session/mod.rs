// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Persisted Session Store
//!
//! Owns every place a session lives outside the reconciler: the durable
//! key-value store (`token`, `user`) and the cookie jar (`token`,
//! `walletConnected`) the route guard reads.
//!
//! ## Contract
//!
//! - [`SessionStore::persist`] writes all locations in one call; a failed
//!   durable write leaves nothing behind.
//! - [`SessionStore::clear`] removes all locations and is idempotent.
//! - Reads fail open: a missing or unparsable record is "no session".

pub mod cookies;
pub mod kv;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::auth::Role;
use crate::config::COOKIE_MAX_AGE;
use crate::error::{PortalError, PortalResult};

pub use cookies::SessionCookies;
pub use kv::{FileStore, KeyValueStore, MemoryStore};

/// Durable key holding the bearer token.
pub const TOKEN_KEY: &str = "token";
/// Durable key holding the serialized user record.
pub const USER_KEY: &str = "user";
/// Cookie mirroring the bearer token for the route guard.
pub const TOKEN_COOKIE: &str = "token";
/// Cookie flagging that a wallet was connected when the session was created.
pub const WALLET_CONNECTED_COOKIE: &str = "walletConnected";

/// User record returned by the auth API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(alias = "_id")]
    pub id: String,
    pub wallet_address: String,
    #[serde(default)]
    pub role: Role,
    /// Fields the portal does not interpret (name, points, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserRecord {
    /// Whether this user is bound to `address` (case-insensitive).
    pub fn owns_wallet(&self, address: &str) -> bool {
        self.wallet_address.eq_ignore_ascii_case(address)
    }

    pub fn is_admin(&self) -> bool {
        self.role.has_privilege(Role::Admin)
    }
}

/// Logged-in identity: bearer token plus user record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: UserRecord,
}

impl Session {
    /// Lower-cased wallet address of the session owner.
    pub fn wallet_address(&self) -> String {
        self.user.wallet_address.to_lowercase()
    }
}

/// Single owner of the persisted session.
#[derive(Debug)]
pub struct SessionStore<K> {
    kv: K,
    cookies: SessionCookies,
}

impl<K: KeyValueStore> SessionStore<K> {
    pub fn new(kv: K) -> Self {
        Self {
            kv,
            cookies: SessionCookies::new(),
        }
    }

    /// Cookie jar to attach to requests against the page shell.
    pub fn cookies(&self) -> &SessionCookies {
        &self.cookies
    }

    /// Read the session, distinguishing "absent" from "corrupt".
    pub fn try_load(&self) -> PortalResult<Option<Session>> {
        let token = match self.kv.get(TOKEN_KEY)? {
            Some(token) if !token.is_empty() => token,
            _ => return Ok(None),
        };
        let raw_user = match self.kv.get(USER_KEY)? {
            Some(raw) => raw,
            None => return Ok(None),
        };
        let user: UserRecord = serde_json::from_str(&raw_user)
            .map_err(|e| PortalError::MalformedPersistedState(e.to_string()))?;

        Ok(Some(Session { token, user }))
    }

    /// Read the session, treating any failure as "no session".
    pub fn load(&self) -> Option<Session> {
        match self.try_load() {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, code = e.error_code(), "Ignoring unreadable persisted session");
                None
            }
        }
    }

    /// Stored bearer token, if any.
    pub fn get_token(&self) -> Option<String> {
        self.kv
            .get(TOKEN_KEY)
            .ok()
            .flatten()
            .filter(|token| !token.is_empty())
    }

    /// Stored user record. Malformed JSON yields `None`.
    pub fn get_user(&self) -> Option<UserRecord> {
        let raw = self.kv.get(USER_KEY).ok().flatten()?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(error = %e, "Persisted user record is malformed");
                None
            }
        }
    }

    /// Whether the `walletConnected` cookie is still live.
    pub fn wallet_was_connected(&self) -> bool {
        self.cookies.get(WALLET_CONNECTED_COOKIE).as_deref() == Some("true")
    }

    /// Replace the persisted session. The stored wallet address is
    /// lower-cased.
    pub fn persist(&self, session: &Session) -> PortalResult<Session> {
        let mut session = session.clone();
        session.user.wallet_address = session.user.wallet_address.to_lowercase();

        let raw_user = serde_json::to_string(&session.user)
            .map_err(|e| PortalError::Storage(e.to_string()))?;

        self.kv.apply(&[
            (TOKEN_KEY, Some(session.token.as_str())),
            (USER_KEY, Some(raw_user.as_str())),
        ])?;

        self.cookies.set(TOKEN_COOKIE, &session.token, COOKIE_MAX_AGE);
        self.cookies.set(WALLET_CONNECTED_COOKIE, "true", COOKIE_MAX_AGE);

        debug!(wallet = %session.user.wallet_address, "Persisted session");
        Ok(session)
    }

    /// Remove the session from every location. Safe to call repeatedly.
    ///
    /// Cookies are always dropped; the error reports a durable removal that
    /// did not happen.
    pub fn clear(&self) -> PortalResult<()> {
        self.cookies.remove(TOKEN_COOKIE);
        self.cookies.remove(WALLET_CONNECTED_COOKIE);

        self.kv.apply(&[(TOKEN_KEY, None), (USER_KEY, None)])
    }
}
