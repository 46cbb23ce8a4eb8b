// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Published authentication state.

use crate::session::{Session, UserRecord};

/// Session validity state.
///
/// ```text
/// LoggedOut --signature verified--> Authenticated
/// LoggedOut --stored session, wallet unresolved--> PendingVerify
/// PendingVerify --addresses match--> Authenticated
/// Authenticated --mismatch | disconnect | logout--> LoggedOut
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    LoggedOut,
    /// Wallet state not yet resolved, or a sign-in is being verified.
    /// Treated as unauthenticated.
    PendingVerify,
    Authenticated,
}

/// What dependents (resource handles, UI) see of the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthSnapshot {
    pub phase: SessionPhase,
    pub token: Option<String>,
    pub user: Option<UserRecord>,
}

impl AuthSnapshot {
    pub fn logged_out() -> Self {
        Self::default()
    }

    pub fn pending() -> Self {
        Self {
            phase: SessionPhase::PendingVerify,
            ..Self::default()
        }
    }

    pub fn authenticated(session: Session) -> Self {
        Self {
            phase: SessionPhase::Authenticated,
            token: Some(session.token),
            user: Some(session.user),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.phase == SessionPhase::Authenticated
    }

    pub fn is_loading(&self) -> bool {
        self.phase == SessionPhase::PendingVerify
    }

    /// Token and cache scope, only while authenticated.
    pub fn credentials(&self) -> Option<(&str, String)> {
        if !self.is_authenticated() {
            return None;
        }
        let token = self.token.as_deref()?;
        let user = self.user.as_ref()?;
        Some((token, user.wallet_address.to_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::sample_session;

    #[test]
    fn pending_is_not_authenticated() {
        let snapshot = AuthSnapshot::pending();
        assert!(snapshot.is_loading());
        assert!(!snapshot.is_authenticated());
        assert!(snapshot.credentials().is_none());
    }

    #[test]
    fn authenticated_exposes_lowercase_scope() {
        let snapshot = AuthSnapshot::authenticated(sample_session("0xABC"));
        let (token, scope) = snapshot.credentials().unwrap();
        assert_eq!(token, "token-0xabc");
        assert_eq!(scope, "0xabc");
    }
}
