// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet connection observer.
//!
//! The wallet connector owns the connection; the portal only watches it.
//! [`WalletConnector`] is the connector-side handle that publishes state,
//! [`WalletObserver`] is the read-only side handed to the reconciler.

use std::future::Future;

use tokio::sync::watch;

use crate::error::PortalResult;

/// Connection state as reported by the wallet connector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionState {
    pub is_connected: bool,
    pub address: Option<String>,
}

impl ConnectionState {
    pub fn connected(address: impl Into<String>) -> Self {
        Self {
            is_connected: true,
            address: Some(address.into()),
        }
    }

    pub fn disconnected() -> Self {
        Self::default()
    }

    /// Lower-cased active address, only while connected.
    pub fn active_address(&self) -> Option<String> {
        if self.is_connected {
            self.address.as_ref().map(|a| a.to_lowercase())
        } else {
            None
        }
    }
}

/// Connector-side publisher of connection state.
#[derive(Debug)]
pub struct WalletConnector {
    tx: watch::Sender<ConnectionState>,
}

impl WalletConnector {
    /// Start in the disconnected state.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ConnectionState::disconnected());
        Self { tx }
    }

    /// Publish a new state. Identical states are not re-broadcast.
    pub fn publish(&self, state: ConnectionState) {
        self.tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                tracing::debug!(
                    connected = state.is_connected,
                    address = ?state.address,
                    "Wallet state changed"
                );
                *current = state;
                true
            }
        });
    }

    pub fn connect(&self, address: impl Into<String>) {
        self.publish(ConnectionState::connected(address));
    }

    pub fn disconnect(&self) {
        self.publish(ConnectionState::disconnected());
    }

    /// New observer; its first read is the current state.
    pub fn observe(&self) -> WalletObserver {
        WalletObserver {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for WalletConnector {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of the connector.
#[derive(Debug, Clone)]
pub struct WalletObserver {
    rx: watch::Receiver<ConnectionState>,
}

impl WalletObserver {
    /// Current state, marking it seen.
    pub fn current(&mut self) -> ConnectionState {
        self.rx.borrow_and_update().clone()
    }

    /// Wait for the next change. `None` once the connector is gone.
    pub async fn changed(&mut self) -> Option<ConnectionState> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

/// Signs login challenges with the connected wallet.
pub trait WalletSigner: Send + Sync {
    fn sign_message(&self, message: &str) -> impl Future<Output = PortalResult<String>> + Send;
}
