// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Food Rescue Portal - wallet session and data sync core
//!
//! Keeps a wallet-signed session consistent with the connected wallet,
//! serves backend resources through a shared cache and guards the
//! dashboard pages.
//!
//! ## Modules
//!
//! - `api` - HTTP shell: route guard, page shells, health (Axum)
//! - `auth` - Sign-in, session reconciliation, roles
//! - `cache` - Shared resource cache
//! - `resources` - Typed resource handles (events, rewards, NFTs, activity)
//! - `session` - Durable session store and cookies
//! - `wallet` - Wallet connection state

pub mod api;
pub mod auth;
pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod navigation;
pub mod portal;
pub mod resources;
pub mod session;
pub mod state;
pub mod wallet;
