// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Auth Reconciliation
//!
//! Keeps the persisted session consistent with the connected wallet.
//!
//! ## Strategy
//!
//! On start and on every wallet-state change the reconciler:
//! 1. Reads the persisted session (unreadable counts as absent).
//! 2. Wallet connected: the session survives only if its wallet address
//!    matches the connected one (case-insensitive) and its token is not
//!    certainly expired; otherwise the session is ended.
//! 3. Wallet disconnected: the session is ended only if this reconciler has
//!    already seen a connected wallet. Before that the connector may still
//!    be initializing, so the session is held as `PendingVerify`.
//!
//! Ending a session clears the session store and every auth-scoped cache
//! entry, publishes the logged-out snapshot, then redirects to login. If the
//! durable record cannot be removed, its token is refused by later passes
//! until a removal succeeds or a new sign-in replaces it.
//!
//! A backend 401 on a request made for the current session ends it as well
//! (see [`ResourceCache::subscribe_rejections`]).
//!
//! ## Shutdown
//!
//! [`AuthReconciler::run`] uses `tokio_util::sync::CancellationToken`, and
//! also stops when the wallet connector goes away.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::api::AuthApi;
use super::snapshot::AuthSnapshot;
use super::token::{self, TokenStatus};
use crate::cache::ResourceCache;
use crate::config::{DASHBOARD_PATH, LOGIN_PATH};
use crate::error::{PortalError, PortalResult};
use crate::navigation::Navigator;
use crate::session::{KeyValueStore, Session, SessionStore, UserRecord};
use crate::wallet::{ConnectionState, WalletObserver, WalletSigner};

/// Why a session was ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    Explicit,
    Disconnected,
    IdentityMismatch,
    TokenExpired,
    /// The backend refused the session token.
    Rejected,
}

impl std::fmt::Display for LogoutReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogoutReason::Explicit => write!(f, "explicit"),
            LogoutReason::Disconnected => write!(f, "disconnected"),
            LogoutReason::IdentityMismatch => write!(f, "identity_mismatch"),
            LogoutReason::TokenExpired => write!(f, "token_expired"),
            LogoutReason::Rejected => write!(f, "rejected"),
        }
    }
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Nothing persisted
    NoSession,
    /// Session kept but wallet not resolved yet
    Pending,
    Authenticated,
    /// Session ended during this pass
    LoggedOut(LogoutReason),
}

/// Owns the in-memory session state and its reconciliation with the wallet.
pub struct AuthReconciler<K, N> {
    store: SessionStore<K>,
    navigator: N,
    cache: Arc<ResourceCache>,
    snapshot: watch::Sender<AuthSnapshot>,
    seen_connected: AtomicBool,
    /// Token of a session whose durable removal failed.
    revoked_token: Mutex<Option<String>>,
}

impl<K: KeyValueStore, N: Navigator> AuthReconciler<K, N> {
    pub fn new(store: SessionStore<K>, navigator: N, cache: Arc<ResourceCache>) -> Self {
        let (snapshot, _rx) = watch::channel(AuthSnapshot::pending());
        Self {
            store,
            navigator,
            cache,
            snapshot,
            seen_connected: AtomicBool::new(false),
            revoked_token: Mutex::new(None),
        }
    }

    /// Subscribe to published snapshots.
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.snapshot.borrow().is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.snapshot.borrow().is_loading()
    }

    pub fn token(&self) -> Option<String> {
        self.snapshot.borrow().token.clone()
    }

    pub fn user(&self) -> Option<UserRecord> {
        self.snapshot.borrow().user.clone()
    }

    pub fn store(&self) -> &SessionStore<K> {
        &self.store
    }

    /// Run one reconciliation pass against `wallet`.
    pub fn reconcile(&self, wallet: &ConnectionState) -> ReconcileOutcome {
        let session = self.store.load().filter(|session| !self.is_revoked(session));

        if wallet.is_connected && wallet.address.is_none() {
            // Connector reports connected before it knows the account.
            return self.hold_or_clear(session.is_some());
        }

        let Some(address) = wallet.active_address() else {
            return match session {
                None => {
                    self.publish(AuthSnapshot::logged_out());
                    ReconcileOutcome::NoSession
                }
                Some(_) if self.seen_connected.load(Ordering::SeqCst) => {
                    self.end_session(LogoutReason::Disconnected);
                    ReconcileOutcome::LoggedOut(LogoutReason::Disconnected)
                }
                Some(_) => {
                    debug!(
                        wallet_cookie = self.store.wallet_was_connected(),
                        "Wallet not resolved yet; holding persisted session"
                    );
                    self.publish(AuthSnapshot::pending());
                    ReconcileOutcome::Pending
                }
            };
        };

        self.seen_connected.store(true, Ordering::SeqCst);

        let Some(session) = session else {
            self.publish(AuthSnapshot::logged_out());
            return ReconcileOutcome::NoSession;
        };

        let stored = session.wallet_address();
        if stored != address {
            let mismatch = PortalError::IdentityMismatch {
                stored,
                connected: address,
            };
            warn!(error = %mismatch, code = mismatch.error_code(), "Ending session");
            self.end_session(LogoutReason::IdentityMismatch);
            return ReconcileOutcome::LoggedOut(LogoutReason::IdentityMismatch);
        }

        if token::inspect_now(&session.token) == TokenStatus::Expired {
            self.end_session(LogoutReason::TokenExpired);
            return ReconcileOutcome::LoggedOut(LogoutReason::TokenExpired);
        }

        self.publish(AuthSnapshot::authenticated(session));
        ReconcileOutcome::Authenticated
    }

    /// End the session. Safe to call when already logged out.
    pub fn logout(&self) {
        self.end_session(LogoutReason::Explicit);
    }

    /// The backend refused the token of the session scoped to `scope`.
    ///
    /// Ends the current session if it belongs to `scope`; returns whether it
    /// did. Rejections for an earlier session are ignored.
    pub fn session_rejected(&self, scope: &str) -> bool {
        let current = self
            .snapshot
            .borrow()
            .credentials()
            .map(|(_, wallet)| wallet);
        if current.as_deref() != Some(scope) {
            debug!(scope, "Ignoring rejection for inactive session");
            return false;
        }

        let rejected = PortalError::NotAuthenticated;
        warn!(scope, error = %rejected, code = rejected.error_code(), "Backend refused session token");
        self.end_session(LogoutReason::Rejected);
        true
    }

    pub fn redirect_to_login(&self) {
        self.navigator.navigate(LOGIN_PATH);
    }

    pub fn redirect_to_dashboard(&self) {
        self.navigator.navigate(DASHBOARD_PATH);
    }

    /// Sign in with the connected wallet.
    ///
    /// Requests a nonce, has the wallet sign it, verifies the signature with
    /// the backend and persists the resulting session. The verified user
    /// must own the signing wallet.
    pub async fn sign_in<S: WalletSigner>(
        &self,
        api: &AuthApi,
        signer: &S,
        wallet: &ConnectionState,
    ) -> PortalResult<Session> {
        let address = wallet.active_address().ok_or(PortalError::NotAuthenticated)?;
        self.publish(AuthSnapshot::pending());

        let result = async {
            let nonce = api.request_nonce(&address).await?;
            let signature = signer.sign_message(&nonce).await?;
            let session = api.verify(&address, &signature).await?;

            if !session.user.owns_wallet(&address) {
                return Err(PortalError::IdentityMismatch {
                    stored: session.user.wallet_address.to_lowercase(),
                    connected: address.clone(),
                });
            }

            self.store.persist(&session)
        }
        .await;

        match result {
            Ok(session) => {
                self.seen_connected.store(true, Ordering::SeqCst);
                *self.revoked() = None;
                info!(wallet = %session.user.wallet_address, role = %session.user.role, "Signed in");
                self.publish(AuthSnapshot::authenticated(session.clone()));
                self.redirect_to_dashboard();
                Ok(session)
            }
            Err(e) => {
                warn!(wallet = %address, error = %e, code = e.error_code(), "Sign-in failed");
                self.publish(AuthSnapshot::logged_out());
                Err(e)
            }
        }
    }

    /// Reconcile on every wallet-state change until cancelled. Session
    /// rejections from the cache end the session.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(reconciler.clone().run(connector.observe(), shutdown.clone()));
    /// ```
    pub async fn run(self: Arc<Self>, mut wallet: WalletObserver, shutdown: CancellationToken)
    where
        K: 'static,
        N: 'static,
    {
        info!("Auth reconciler starting");
        let mut rejections = self.cache.subscribe_rejections();
        self.reconcile(&wallet.current());

        loop {
            tokio::select! {
                changed = wallet.changed() => match changed {
                    Some(state) => {
                        let outcome = self.reconcile(&state);
                        debug!(?outcome, "Reconciled after wallet change");
                    }
                    None => {
                        info!("Wallet connector closed; auth reconciler stopping");
                        return;
                    }
                },
                rejected = rejections.recv() => match rejected {
                    Ok(scope) => {
                        self.session_rejected(&scope);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Missed session rejections");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Resource cache closed; auth reconciler stopping");
                        return;
                    }
                },
                _ = shutdown.cancelled() => {
                    info!("Auth reconciler shutting down");
                    return;
                }
            }
        }
    }

    fn hold_or_clear(&self, has_session: bool) -> ReconcileOutcome {
        if has_session {
            self.publish(AuthSnapshot::pending());
            ReconcileOutcome::Pending
        } else {
            self.publish(AuthSnapshot::logged_out());
            ReconcileOutcome::NoSession
        }
    }

    fn end_session(&self, reason: LogoutReason) {
        let token = self.store.get_token();
        if let Err(e) = self.store.clear() {
            error!(%reason, error = %e, code = e.error_code(), "Failed to remove persisted session; refusing it");
            *self.revoked() = token;
        }
        let cleared = self.cache.clear_auth_scoped();
        self.publish(AuthSnapshot::logged_out());
        info!(%reason, cleared_entries = cleared, "Session ended");
        self.redirect_to_login();
    }

    /// Whether `session` is a revoked one still on disk. Retries the removal.
    fn is_revoked(&self, session: &Session) -> bool {
        let mut revoked = self.revoked();
        if revoked.as_deref() != Some(session.token.as_str()) {
            return false;
        }
        match self.store.clear() {
            Ok(()) => {
                info!("Removed previously revoked session");
                *revoked = None;
            }
            Err(e) => debug!(error = %e, "Revoked session still persisted"),
        }
        true
    }

    fn revoked(&self) -> MutexGuard<'_, Option<String>> {
        self.revoked_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, next: AuthSnapshot) {
        self.snapshot.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use axum::{routing::post, Json, Router};
    use serde_json::{json, Value};

    use crate::auth::token::tests::test_jwt;
    use crate::backend::{tests::spawn_backend, BackendClient};
    use crate::cache::tests::{test_config, MockFetcher};
    use crate::cache::CacheKey;
    use crate::resources::ResourceHub;
    use crate::session::tests::{sample_session, FailingRemoves};
    use crate::session::{MemoryStore, TOKEN_COOKIE};
    use crate::wallet::WalletConnector;

    /// Records every redirect.
    #[derive(Clone, Default)]
    pub(crate) struct RecordingNavigator {
        pub(crate) paths: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingNavigator {
        pub(crate) fn last(&self) -> Option<String> {
            self.paths.lock().unwrap().last().cloned()
        }

        pub(crate) fn count(&self) -> usize {
            self.paths.lock().unwrap().len()
        }
    }

    impl Navigator for RecordingNavigator {
        fn navigate(&self, path: &str) {
            self.paths.lock().unwrap().push(path.to_string());
        }
    }

    struct EchoSigner;

    impl WalletSigner for EchoSigner {
        async fn sign_message(&self, message: &str) -> PortalResult<String> {
            Ok(format!("signed:{message}"))
        }
    }

    fn reconciler() -> (
        AuthReconciler<MemoryStore, RecordingNavigator>,
        RecordingNavigator,
        Arc<ResourceCache>,
    ) {
        let navigator = RecordingNavigator::default();
        let cache = Arc::new(ResourceCache::new(test_config()));
        let reconciler = AuthReconciler::new(
            SessionStore::new(MemoryStore::new()),
            navigator.clone(),
            cache.clone(),
        );
        (reconciler, navigator, cache)
    }

    async fn auth_backend(user_wallet: Option<&'static str>) -> AuthApi {
        let app = Router::new()
            .route(
                "/api/auth/nonce",
                post(|| async { Json(json!({ "data": { "nonce": "n-42" } })) }),
            )
            .route(
                "/api/auth/verify",
                post(move |Json(body): Json<Value>| async move {
                    assert_eq!(body["signature"], "signed:n-42");
                    let wallet = user_wallet
                        .map(Value::from)
                        .unwrap_or_else(|| body["walletAddress"].clone());
                    Json(json!({ "data": {
                        "token": "session-jwt",
                        "user": { "_id": "u1", "walletAddress": wallet, "role": "volunteer" }
                    }}))
                }),
            );
        AuthApi::new(BackendClient::new(spawn_backend(app).await).unwrap())
    }

    #[test]
    fn starts_pending_until_first_reconcile() {
        let (reconciler, _, _) = reconciler();
        assert!(reconciler.is_loading());
        assert!(!reconciler.is_authenticated());

        reconciler.reconcile(&ConnectionState::connected("0xabc"));
        assert!(!reconciler.is_loading());
    }

    #[test]
    fn no_session_stays_logged_out() {
        let (reconciler, navigator, _) = reconciler();
        assert_eq!(
            reconciler.reconcile(&ConnectionState::connected("0xabc")),
            ReconcileOutcome::NoSession
        );
        assert!(!reconciler.is_authenticated());
        assert_eq!(navigator.count(), 0);
    }

    #[test]
    fn matching_wallet_authenticates_case_insensitively() {
        let (reconciler, navigator, _) = reconciler();
        reconciler.store().persist(&sample_session("0xabc")).unwrap();

        assert_eq!(
            reconciler.reconcile(&ConnectionState::connected("0xABC")),
            ReconcileOutcome::Authenticated
        );
        assert!(reconciler.is_authenticated());
        assert_eq!(reconciler.token().as_deref(), Some("token-0xabc"));
        assert_eq!(reconciler.user().unwrap().wallet_address, "0xabc");
        assert_eq!(navigator.count(), 0);
    }

    #[test]
    fn mismatched_wallet_clears_session_in_one_pass() {
        let (reconciler, navigator, cache) = reconciler();
        reconciler.store().persist(&sample_session("0xabc")).unwrap();
        reconciler.reconcile(&ConnectionState::connected("0xabc"));
        cache.update_local(&CacheKey::scoped("http://h/api/nft/user", "0xabc"), |_| json!([1]));

        assert_eq!(
            reconciler.reconcile(&ConnectionState::connected("0xDEF")),
            ReconcileOutcome::LoggedOut(LogoutReason::IdentityMismatch)
        );
        assert!(!reconciler.is_authenticated());
        assert_eq!(reconciler.store().load(), None);
        assert!(cache.is_empty());
        assert_eq!(navigator.last().as_deref(), Some(LOGIN_PATH));
    }

    #[test]
    fn disconnect_before_first_connect_holds_session() {
        let (reconciler, navigator, _) = reconciler();
        reconciler.store().persist(&sample_session("0xabc")).unwrap();

        assert_eq!(
            reconciler.reconcile(&ConnectionState::disconnected()),
            ReconcileOutcome::Pending
        );
        assert!(reconciler.is_loading());
        assert!(!reconciler.is_authenticated());
        assert!(reconciler.store().load().is_some());
        assert_eq!(navigator.count(), 0);
    }

    #[test]
    fn disconnect_after_connect_logs_out() {
        let (reconciler, navigator, _) = reconciler();
        reconciler.store().persist(&sample_session("0xabc")).unwrap();
        reconciler.reconcile(&ConnectionState::connected("0xabc"));

        assert_eq!(
            reconciler.reconcile(&ConnectionState::disconnected()),
            ReconcileOutcome::LoggedOut(LogoutReason::Disconnected)
        );
        assert_eq!(reconciler.store().load(), None);
        assert_eq!(navigator.last().as_deref(), Some(LOGIN_PATH));
    }

    #[test]
    fn connected_without_address_is_pending() {
        let (reconciler, _, _) = reconciler();
        reconciler.store().persist(&sample_session("0xabc")).unwrap();
        let resolving = ConnectionState {
            is_connected: true,
            address: None,
        };
        assert_eq!(reconciler.reconcile(&resolving), ReconcileOutcome::Pending);
    }

    #[test]
    fn expired_token_ends_session() {
        let (reconciler, _, _) = reconciler();
        let mut session = sample_session("0xabc");
        session.token = test_jwt(1_000);
        reconciler.store().persist(&session).unwrap();

        assert_eq!(
            reconciler.reconcile(&ConnectionState::connected("0xabc")),
            ReconcileOutcome::LoggedOut(LogoutReason::TokenExpired)
        );
    }

    #[test]
    fn live_jwt_is_accepted() {
        let (reconciler, _, _) = reconciler();
        let mut session = sample_session("0xabc");
        session.token = test_jwt(chrono::Utc::now().timestamp() + 3600);
        reconciler.store().persist(&session).unwrap();

        assert_eq!(
            reconciler.reconcile(&ConnectionState::connected("0xabc")),
            ReconcileOutcome::Authenticated
        );
    }

    #[test]
    fn malformed_persisted_state_fails_open() {
        let kv = MemoryStore::new();
        kv.apply(&[("token", Some("t")), ("user", Some("not json"))])
            .unwrap();
        let reconciler = AuthReconciler::new(
            SessionStore::new(kv),
            RecordingNavigator::default(),
            Arc::new(ResourceCache::new(test_config())),
        );

        assert_eq!(
            reconciler.reconcile(&ConnectionState::connected("0xabc")),
            ReconcileOutcome::NoSession
        );
        assert!(!reconciler.is_authenticated());
    }

    #[test]
    fn logout_is_idempotent() {
        let (reconciler, navigator, cache) = reconciler();
        reconciler.store().persist(&sample_session("0xabc")).unwrap();
        reconciler.reconcile(&ConnectionState::connected("0xabc"));
        let public = CacheKey::public("http://h/api/health");
        cache.update_local(&public, |_| json!("ok"));
        cache.update_local(&CacheKey::scoped("http://h/api/event", "0xabc"), |_| json!([]));

        reconciler.logout();
        let once = (reconciler.snapshot(), reconciler.store().load(), cache.len());
        reconciler.logout();
        let twice = (reconciler.snapshot(), reconciler.store().load(), cache.len());

        assert_eq!(once, twice);
        assert_eq!(once.0, AuthSnapshot::logged_out());
        assert_eq!(once.1, None);
        assert_eq!(once.2, 1);
        assert_eq!(reconciler.store().cookies().get(TOKEN_COOKIE), None);
        assert_eq!(navigator.last().as_deref(), Some(LOGIN_PATH));
    }

    #[test]
    fn logout_survives_failed_durable_clear() {
        let navigator = RecordingNavigator::default();
        let reconciler = AuthReconciler::new(
            SessionStore::new(FailingRemoves::default()),
            navigator.clone(),
            Arc::new(ResourceCache::new(test_config())),
        );
        reconciler.store().persist(&sample_session("0xabc")).unwrap();
        reconciler.reconcile(&ConnectionState::connected("0xabc"));
        assert!(reconciler.is_authenticated());

        reconciler.logout();
        assert!(reconciler.store().load().is_some());

        assert_eq!(
            reconciler.reconcile(&ConnectionState::connected("0xabc")),
            ReconcileOutcome::NoSession
        );
        assert!(!reconciler.is_authenticated());
        assert_eq!(navigator.last().as_deref(), Some(LOGIN_PATH));
    }

    #[test]
    fn rejection_ends_only_the_matching_session() {
        let (reconciler, navigator, cache) = reconciler();
        reconciler.store().persist(&sample_session("0xabc")).unwrap();
        reconciler.reconcile(&ConnectionState::connected("0xabc"));
        cache.update_local(&CacheKey::scoped("http://h/api/event", "0xabc"), |_| json!([]));

        assert!(!reconciler.session_rejected("0xdef"));
        assert!(reconciler.is_authenticated());

        assert!(reconciler.session_rejected("0xabc"));
        assert!(!reconciler.is_authenticated());
        assert_eq!(reconciler.store().load(), None);
        assert!(cache.is_empty());
        assert_eq!(navigator.last().as_deref(), Some(LOGIN_PATH));
    }

    #[tokio::test]
    async fn backend_401_during_fetch_ends_session() {
        let (reconciler, navigator, cache) = reconciler();
        reconciler.store().persist(&sample_session("0xabc")).unwrap();
        let reconciler = Arc::new(reconciler);
        let mut snapshots = reconciler.subscribe();

        let connector = WalletConnector::new();
        connector.connect("0xabc");
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(reconciler.clone().run(connector.observe(), shutdown.clone()));
        tokio::time::timeout(
            Duration::from_secs(1),
            snapshots.wait_for(|s| s.is_authenticated()),
        )
        .await
        .unwrap()
        .unwrap();

        let hub = ResourceHub::new(
            cache,
            Arc::new(MockFetcher::new(vec![Err(PortalError::NotAuthenticated)])),
            reconciler.subscribe(),
            Duration::from_secs(30),
        );
        let state = hub.events().load().await;
        assert_eq!(state.error, Some(PortalError::NotAuthenticated));

        tokio::time::timeout(
            Duration::from_secs(1),
            snapshots.wait_for(|s| s.phase == crate::auth::SessionPhase::LoggedOut),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(reconciler.store().load(), None);
        assert_eq!(navigator.last().as_deref(), Some(LOGIN_PATH));

        shutdown.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn sign_in_then_wallet_switch_scenario() {
        let (reconciler, navigator, _) = reconciler();
        let api = auth_backend(None).await;
        let wallet = ConnectionState::connected("0xABC");

        let session = reconciler.sign_in(&api, &EchoSigner, &wallet).await.unwrap();
        assert_eq!(session.user.wallet_address, "0xabc");
        assert_eq!(
            reconciler.store().get_user().unwrap().wallet_address,
            "0xabc"
        );
        assert!(reconciler.is_authenticated());
        assert_eq!(navigator.last().as_deref(), Some(DASHBOARD_PATH));

        assert_eq!(
            reconciler.reconcile(&ConnectionState::connected("0xDEF")),
            ReconcileOutcome::LoggedOut(LogoutReason::IdentityMismatch)
        );
        assert_eq!(reconciler.store().load(), None);
        assert_eq!(navigator.last().as_deref(), Some(LOGIN_PATH));
    }

    #[tokio::test]
    async fn sign_in_rejects_session_for_other_wallet() {
        let (reconciler, _, _) = reconciler();
        let api = auth_backend(Some("0x999")).await;

        let err = reconciler
            .sign_in(&api, &EchoSigner, &ConnectionState::connected("0xabc"))
            .await
            .unwrap_err();

        assert!(matches!(err, PortalError::IdentityMismatch { .. }));
        assert_eq!(reconciler.store().load(), None);
        assert_eq!(reconciler.snapshot(), AuthSnapshot::logged_out());
    }

    #[tokio::test]
    async fn sign_in_requires_connected_wallet() {
        let (reconciler, _, _) = reconciler();
        let api = auth_backend(None).await;
        let err = reconciler
            .sign_in(&api, &EchoSigner, &ConnectionState::disconnected())
            .await
            .unwrap_err();
        assert_eq!(err, PortalError::NotAuthenticated);
    }

    #[tokio::test]
    async fn run_loop_follows_wallet_events() {
        let (reconciler, navigator, _) = reconciler();
        reconciler.store().persist(&sample_session("0xabc")).unwrap();
        let reconciler = Arc::new(reconciler);
        let mut snapshots = reconciler.subscribe();

        let connector = WalletConnector::new();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(reconciler.clone().run(connector.observe(), shutdown.clone()));

        connector.connect("0xAbc");
        tokio::time::timeout(
            Duration::from_secs(1),
            snapshots.wait_for(|s| s.is_authenticated()),
        )
        .await
        .unwrap()
        .unwrap();

        connector.connect("0xdef");
        tokio::time::timeout(
            Duration::from_secs(1),
            snapshots.wait_for(|s| s.phase == crate::auth::SessionPhase::LoggedOut),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(navigator.last().as_deref(), Some(LOGIN_PATH));

        shutdown.cancel();
        task.await.unwrap();
    }
}
