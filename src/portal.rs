// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Portal Runtime
//!
//! Wires the session layer together for one process: durable session store,
//! wallet connector, auth reconciler, resource hub and the background tasks
//! that keep them current.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::auth::{AuthApi, AuthReconciler};
use crate::backend::BackendClient;
use crate::cache::ResourceCache;
use crate::config::PortalConfig;
use crate::error::PortalResult;
use crate::navigation::ChannelNavigator;
use crate::resources::ResourceHub;
use crate::session::{FileStore, SessionStore};
use crate::wallet::WalletConnector;

pub type PortalReconciler = AuthReconciler<FileStore, ChannelNavigator>;

pub struct Portal {
    pub wallet: WalletConnector,
    pub reconciler: Arc<PortalReconciler>,
    pub resources: ResourceHub<BackendClient>,
    pub auth_api: AuthApi,
    pub backend: BackendClient,
    pub cache: Arc<ResourceCache>,
}

impl Portal {
    /// Build the runtime. The receiver yields every redirect the session
    /// layer asks for.
    pub fn build(config: &PortalConfig) -> PortalResult<(Self, mpsc::UnboundedReceiver<String>)> {
        let backend = BackendClient::new(config.backend_api_url.clone())?;
        let cache = Arc::new(ResourceCache::new(config.cache.clone()));
        let (navigator, redirects) = ChannelNavigator::new();

        let store = SessionStore::new(FileStore::new(&config.session_dir));
        let reconciler = Arc::new(AuthReconciler::new(store, navigator, cache.clone()));
        let resources = ResourceHub::new(
            cache.clone(),
            Arc::new(backend.clone()),
            reconciler.subscribe(),
            config.events_refresh_interval,
        );

        let portal = Self {
            wallet: WalletConnector::new(),
            reconciler,
            resources,
            auth_api: AuthApi::new(backend.clone()),
            backend,
            cache,
        };
        Ok((portal, redirects))
    }

    /// Spawn the reconciler and the event polling loop.
    pub fn start(&self, shutdown: CancellationToken) -> Vec<JoinHandle<()>> {
        let mut tasks = vec![tokio::spawn(
            self.reconciler
                .clone()
                .run(self.wallet.observe(), shutdown.clone()),
        )];
        tasks.extend(self.resources.events().spawn_refresh(shutdown));
        info!(tasks = tasks.len(), "Portal runtime started");
        tasks
    }
}
