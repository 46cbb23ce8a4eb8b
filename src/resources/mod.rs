// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Resource Handles
//!
//! A [`Resource`] binds one backend endpoint to the shared
//! [`ResourceCache`] and decodes the cached payload into a typed value.
//! Handles are cheap to clone; clones of the same endpoint share one cache
//! entry per session.
//!
//! Handles read the token from the published [`AuthSnapshot`]. Without an
//! authenticated snapshot a handle has no key: it never fetches and reports
//! the default value (empty list, `None`).

pub mod hub;

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::auth::AuthSnapshot;
use crate::cache::{CacheKey, CacheSnapshot, Fetcher, ResourceCache};
use crate::error::{PortalError, PortalResult};

pub use hub::ResourceHub;

/// When a handle goes back to the network on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevalidationPolicy {
    pub on_focus: bool,
    pub on_reconnect: bool,
    pub refresh_interval: Option<Duration>,
}

impl RevalidationPolicy {
    /// Focus and reconnect only.
    pub fn on_demand() -> Self {
        Self {
            on_focus: true,
            on_reconnect: true,
            refresh_interval: None,
        }
    }

    /// Focus, reconnect and a fixed interval.
    pub fn polling(interval: Duration) -> Self {
        Self {
            refresh_interval: Some(interval),
            ..Self::on_demand()
        }
    }
}

impl Default for RevalidationPolicy {
    fn default() -> Self {
        Self::on_demand()
    }
}

/// Typed view of one cached resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceState<T> {
    pub data: T,
    pub is_loading: bool,
    pub is_validating: bool,
    pub error: Option<PortalError>,
    pub last_fetched_at: Option<DateTime<Utc>>,
}

impl<T: Default> Default for ResourceState<T> {
    fn default() -> Self {
        Self {
            data: T::default(),
            is_loading: false,
            is_validating: false,
            error: None,
            last_fetched_at: None,
        }
    }
}

impl<T: DeserializeOwned + Default> ResourceState<T> {
    fn decode(snapshot: CacheSnapshot) -> Self {
        let (data, error) = match snapshot.data {
            None => (T::default(), snapshot.error),
            Some(value) => match serde_json::from_value(value) {
                Ok(data) => (data, snapshot.error),
                Err(e) => (
                    T::default(),
                    Some(PortalError::MalformedResponse(e.to_string())),
                ),
            },
        };
        Self {
            data,
            is_loading: snapshot.is_loading,
            is_validating: snapshot.is_validating,
            error,
            last_fetched_at: snapshot.last_fetched_at,
        }
    }
}

/// One endpoint read through the shared cache.
pub struct Resource<T, F> {
    cache: Arc<ResourceCache>,
    fetcher: Arc<F>,
    auth: watch::Receiver<AuthSnapshot>,
    path: String,
    policy: RevalidationPolicy,
    _data: PhantomData<fn() -> T>,
}

impl<T, F> Clone for Resource<T, F> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            fetcher: self.fetcher.clone(),
            auth: self.auth.clone(),
            path: self.path.clone(),
            policy: self.policy,
            _data: PhantomData,
        }
    }
}

impl<T, F> Resource<T, F>
where
    T: DeserializeOwned + Default,
    F: Fetcher,
{
    pub fn new(
        cache: Arc<ResourceCache>,
        fetcher: Arc<F>,
        auth: watch::Receiver<AuthSnapshot>,
        path: impl Into<String>,
        policy: RevalidationPolicy,
    ) -> Self {
        Self {
            cache,
            fetcher,
            auth,
            path: path.into(),
            policy,
            _data: PhantomData,
        }
    }

    pub fn with_policy(mut self, policy: RevalidationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Cache key for the current session, `None` when unauthenticated.
    pub fn key(&self) -> Option<CacheKey> {
        self.credentials().map(|(_, key)| key)
    }

    /// Cached state without touching the network.
    pub fn state(&self) -> ResourceState<T> {
        match self.key() {
            Some(key) => ResourceState::decode(self.cache.snapshot(&key)),
            None => ResourceState::default(),
        }
    }

    /// Read through the cache, honouring the dedupe window.
    pub async fn load(&self) -> ResourceState<T> {
        self.revalidate(false).await
    }

    /// Re-fetch unconditionally. Every consumer of the key is notified once
    /// the response is committed.
    pub async fn mutate(&self) -> ResourceState<T> {
        self.revalidate(true).await
    }

    /// Window regained focus.
    pub async fn on_focus(&self) -> ResourceState<T> {
        if self.policy.on_focus {
            self.load().await
        } else {
            self.state()
        }
    }

    /// Network came back.
    pub async fn on_reconnect(&self) -> ResourceState<T> {
        if self.policy.on_reconnect {
            self.load().await
        } else {
            self.state()
        }
    }

    /// Stream of cache changes; pass it to [`Resource::changed`].
    pub fn subscribe(&self) -> broadcast::Receiver<CacheKey> {
        self.cache.subscribe()
    }

    /// Wait until this handle's entry changes. `None` when the cache is gone.
    pub async fn changed(
        &self,
        updates: &mut broadcast::Receiver<CacheKey>,
    ) -> Option<ResourceState<T>> {
        loop {
            match updates.recv().await {
                Ok(changed) if Some(&changed) == self.key().as_ref() => {
                    return Some(self.state())
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => return Some(self.state()),
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    async fn revalidate(&self, force: bool) -> ResourceState<T> {
        let Some((token, key)) = self.credentials() else {
            debug!(path = %self.path, "Skipping fetch without session");
            return ResourceState::default();
        };
        let snapshot = self
            .cache
            .revalidate(&key, self.fetcher.as_ref(), &token, force)
            .await;
        ResourceState::decode(snapshot)
    }

    fn credentials(&self) -> Option<(String, CacheKey)> {
        let auth = self.auth.borrow();
        let (token, scope) = auth.credentials()?;
        let key = CacheKey::scoped(&self.fetcher.url_for(&self.path), &scope);
        Some((token.to_string(), key))
    }
}

impl<T, F> Resource<T, F>
where
    T: DeserializeOwned + Serialize + Default,
    F: Fetcher,
{
    /// Rewrite the cached value locally. The entry is marked stale, so the
    /// next read goes back to the server.
    pub fn update_local(&self, update: impl FnOnce(T) -> T) -> PortalResult<()> {
        let key = self.key().ok_or(PortalError::NotAuthenticated)?;
        let mut encode_error = None;
        self.cache.update_local(&key, |current| {
            let value: T = current
                .and_then(|v| serde_json::from_value(v).ok())
                .unwrap_or_default();
            match serde_json::to_value(update(value)) {
                Ok(encoded) => encoded,
                Err(e) => {
                    encode_error = Some(PortalError::MalformedResponse(e.to_string()));
                    serde_json::Value::Null
                }
            }
        });
        encode_error.map_or(Ok(()), Err)
    }
}

impl<T, F> Resource<T, F>
where
    T: DeserializeOwned + Default + Send + 'static,
    F: Fetcher + 'static,
{
    /// Revalidate on the policy's interval until cancelled. `None` when the
    /// policy has no interval.
    pub fn spawn_refresh(&self, shutdown: CancellationToken) -> Option<JoinHandle<()>> {
        let interval = self.policy.refresh_interval?;
        let resource = self.clone();

        Some(tokio::spawn(async move {
            info!(path = %resource.path, interval_ms = interval.as_millis() as u64, "Resource refresh starting");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        resource.mutate().await;
                    }
                    _ = shutdown.cancelled() => {
                        info!(path = %resource.path, "Resource refresh shutting down");
                        return;
                    }
                }
            }
        }))
    }
}
