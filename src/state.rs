// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::backend::BackendClient;
use crate::cache::ResourceCache;

#[derive(Clone)]
pub struct AppState {
    pub backend: BackendClient,
    pub cache: Arc<ResourceCache>,
}

impl AppState {
    pub fn new(backend: BackendClient, cache: Arc<ResourceCache>) -> Self {
        Self { backend, cache }
    }
}
