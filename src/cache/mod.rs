// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Shared Resource Cache
//!
//! Process-wide map from [`CacheKey`] to the last known response for that
//! key. Every resource handle reads through it, so consumers of one key
//! share one entry and one network request.
//!
//! ## Rules
//!
//! - Requests for a key inside the dedupe window reuse the last request;
//!   callers arriving while it is in flight wait for its result.
//! - Retryable failures (network, 5xx) are retried a fixed number of times.
//! - Each entry has a generation. Invalidating or locally rewriting an entry
//!   gives it a new one, and a response that comes back for an older
//!   generation is discarded.
//! - Failed requests keep the previous data and record the error.
//! - Every commit is broadcast as the key that changed.
//! - A scoped request the backend answers with 401 is broadcast as a
//!   session rejection carrying the scope.

pub mod key;

use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use chrono::{DateTime, Utc};
use lru::LruCache;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::error::{PortalError, PortalResult};

pub use key::{normalize_url, CacheKey};

const UPDATE_CHANNEL_CAPACITY: usize = 64;

/// Performs the network side of a cache read.
pub trait Fetcher: Send + Sync {
    /// Absolute request URL for an API path.
    fn url_for(&self, path: &str) -> String;

    /// Authenticated `GET`, returning the unwrapped payload.
    fn fetch(&self, url: &str, token: &str) -> impl Future<Output = PortalResult<Value>> + Send;

    /// Authenticated `POST` of a JSON body, returning the unwrapped payload.
    fn submit(
        &self,
        url: &str,
        token: &str,
        body: &Value,
    ) -> impl Future<Output = PortalResult<Value>> + Send;
}

/// Consumer view of one entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheSnapshot {
    pub data: Option<Value>,
    pub error: Option<PortalError>,
    pub last_fetched_at: Option<DateTime<Utc>>,
    /// A request is in flight and there is no data yet.
    pub is_loading: bool,
    /// A request is in flight.
    pub is_validating: bool,
}

struct CacheEntry {
    data: Option<Value>,
    error: Option<PortalError>,
    last_fetched_at: Option<DateTime<Utc>>,
    last_requested_at: Option<Instant>,
    in_flight: bool,
    generation: u64,
}

impl CacheEntry {
    fn new(generation: u64) -> Self {
        Self {
            data: None,
            error: None,
            last_fetched_at: None,
            last_requested_at: None,
            in_flight: false,
            generation,
        }
    }

    fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            data: self.data.clone(),
            error: self.error.clone(),
            last_fetched_at: self.last_fetched_at,
            is_loading: self.in_flight && self.data.is_none(),
            is_validating: self.in_flight,
        }
    }
}

/// Shared LRU-bounded resource cache.
pub struct ResourceCache {
    entries: Mutex<LruCache<CacheKey, CacheEntry>>,
    config: CacheConfig,
    generations: AtomicU64,
    updates: broadcast::Sender<CacheKey>,
    rejections: broadcast::Sender<String>,
}

impl ResourceCache {
    pub fn new(config: CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let (rejections, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            config,
            generations: AtomicU64::new(1),
            updates,
            rejections,
        }
    }

    /// Stream of keys whose entry changed.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheKey> {
        self.updates.subscribe()
    }

    /// Stream of session scopes whose token the backend refused.
    pub fn subscribe_rejections(&self) -> broadcast::Receiver<String> {
        self.rejections.subscribe()
    }

    /// Current view of `key` without touching the network.
    pub fn snapshot(&self, key: &CacheKey) -> CacheSnapshot {
        self.lock()
            .get(key)
            .map(CacheEntry::snapshot)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Read `key` through the cache.
    ///
    /// With `force` the dedupe window is ignored and a new request is always
    /// issued; this is what `mutate()` uses.
    pub async fn revalidate<F: Fetcher>(
        &self,
        key: &CacheKey,
        fetcher: &F,
        token: &str,
        force: bool,
    ) -> CacheSnapshot {
        // Subscribe before inspecting so a commit between the check and the
        // wait cannot be missed.
        let mut updates = self.updates.subscribe();

        let generation = {
            let mut entries = self.lock();
            let entry =
                entries.get_or_insert_mut(key.clone(), || CacheEntry::new(self.next_generation()));

            let recent = entry
                .last_requested_at
                .is_some_and(|at| at.elapsed() < self.config.dedupe_interval);

            if !force && recent {
                if !entry.in_flight {
                    debug!(%key, "Deduped cache read");
                    return entry.snapshot();
                }
                None
            } else {
                entry.in_flight = true;
                entry.last_requested_at = Some(Instant::now());
                Some(entry.generation)
            }
        };

        let Some(generation) = generation else {
            debug!(%key, "Waiting for in-flight request");
            wait_for_key(&mut updates, key).await;
            return self.snapshot(key);
        };

        let mut in_flight = InFlight {
            cache: self,
            key,
            generation,
            committed: false,
        };
        let result = self.fetch_with_retry(key, fetcher, token).await;
        in_flight.commit(result)
    }

    /// Replace the data of `key` locally, without a request.
    ///
    /// The entry gets a new generation (responses already in flight are
    /// discarded) and is marked stale so the next read revalidates.
    pub fn update_local(&self, key: &CacheKey, update: impl FnOnce(Option<Value>) -> Value) {
        {
            let mut entries = self.lock();
            let generation = self.next_generation();
            let entry = entries.get_or_insert_mut(key.clone(), || CacheEntry::new(generation));
            let current = entry.data.take();
            entry.data = Some(update(current));
            entry.error = None;
            entry.generation = generation;
            entry.in_flight = false;
            entry.last_requested_at = None;
        }
        self.notify(key);
    }

    /// Drop one entry.
    pub fn invalidate(&self, key: &CacheKey) {
        let removed = self.lock().pop(key).is_some();
        if removed {
            self.notify(key);
        }
    }

    /// Drop every entry fetched on behalf of a session. Returns how many.
    pub fn clear_auth_scoped(&self) -> usize {
        let removed: Vec<CacheKey> = {
            let mut entries = self.lock();
            let keys: Vec<CacheKey> = entries
                .iter()
                .filter(|(key, _)| key.is_auth_scoped())
                .map(|(key, _)| key.clone())
                .collect();
            for key in &keys {
                entries.pop(key);
            }
            keys
        };

        for key in &removed {
            self.notify(key);
        }
        removed.len()
    }

    async fn fetch_with_retry<F: Fetcher>(
        &self,
        key: &CacheKey,
        fetcher: &F,
        token: &str,
    ) -> PortalResult<Value> {
        let mut attempt = 0;
        loop {
            match fetcher.fetch(key.url(), token).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.config.error_retry_count => {
                    attempt += 1;
                    warn!(
                        %key,
                        attempt,
                        max = self.config.error_retry_count,
                        error = %e,
                        "Retrying cache fetch"
                    );
                    tokio::time::sleep(self.config.error_retry_interval).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::Relaxed)
    }

    fn notify(&self, key: &CacheKey) {
        // No subscribers is fine.
        let _ = self.updates.send(key.clone());
    }

    fn reject(&self, scope: &str) {
        let _ = self.rejections.send(scope.to_string());
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<CacheKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Marks a request as in flight until committed; if the request future is
/// dropped first, the entry is released so waiters do not hang.
struct InFlight<'a> {
    cache: &'a ResourceCache,
    key: &'a CacheKey,
    generation: u64,
    committed: bool,
}

impl InFlight<'_> {
    fn commit(&mut self, result: PortalResult<Value>) -> CacheSnapshot {
        self.committed = true;
        let mut rejected = false;
        let snapshot = {
            let mut entries = self.cache.lock();
            match entries.get_mut(self.key) {
                Some(entry) if entry.generation == self.generation => {
                    entry.in_flight = false;
                    match result {
                        Ok(value) => {
                            entry.data = Some(value);
                            entry.error = None;
                            entry.last_fetched_at = Some(Utc::now());
                        }
                        Err(e) => {
                            warn!(key = %self.key, error = %e, code = e.error_code(), "Cache fetch failed");
                            rejected = e == PortalError::NotAuthenticated;
                            entry.error = Some(e);
                        }
                    }
                    entry.snapshot()
                }
                Some(entry) => {
                    debug!(key = %self.key, "Discarding response for superseded entry");
                    entry.snapshot()
                }
                None => {
                    debug!(key = %self.key, "Discarding response for invalidated entry");
                    CacheSnapshot::default()
                }
            }
        };
        self.cache.notify(self.key);
        if let Some(scope) = self.key.scope().filter(|_| rejected) {
            self.cache.reject(scope);
        }
        snapshot
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        {
            let mut entries = self.cache.lock();
            if let Some(entry) = entries.get_mut(self.key) {
                if entry.generation == self.generation {
                    entry.in_flight = false;
                    entry.last_requested_at = None;
                }
            }
        }
        self.cache.notify(self.key);
    }
}

async fn wait_for_key(updates: &mut broadcast::Receiver<CacheKey>, key: &CacheKey) {
    loop {
        match updates.recv().await {
            Ok(changed) if changed == *key => return,
            Ok(_) => continue,
            // Missed messages may include ours; re-read the entry.
            Err(broadcast::error::RecvError::Lagged(_)) => return,
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}
