// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Navigation seam between the session layer and whatever renders pages.

use tokio::sync::mpsc;

/// Performs client-side redirects.
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

/// Navigator that forwards paths to a UI loop over a channel.
#[derive(Debug, Clone)]
pub struct ChannelNavigator {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelNavigator {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Navigator for ChannelNavigator {
    fn navigate(&self, path: &str) {
        if self.tx.send(path.to_string()).is_err() {
            tracing::debug!(path, "Navigation dropped; no UI listening");
        }
    }
}
