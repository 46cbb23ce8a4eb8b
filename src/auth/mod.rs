// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Wallet-signature sessions for the volunteer portal.
//!
//! ## Auth Flow
//!
//! 1. User connects a wallet
//! 2. Portal requests a nonce from the backend (`POST /auth/nonce`)
//! 3. Wallet signs the nonce
//! 4. Backend verifies the signature (`POST /auth/verify`) and returns
//!    a token plus the user record
//! 5. Session is persisted and the reconciler keeps it consistent with the
//!    connected wallet from then on
//!
//! ## Security
//!
//! - A session is only valid for the wallet that signed in
//! - Wallet switches end the session before any resource is read for it
//! - Tokens carrying an `exp` claim are rechecked on every reconciliation
//!   (60 second clock skew tolerance)

pub mod api;
pub mod reconciler;
pub mod roles;
pub mod snapshot;
pub mod token;

pub use api::AuthApi;
pub use reconciler::{AuthReconciler, LogoutReason, ReconcileOutcome};
pub use roles::Role;
pub use snapshot::{AuthSnapshot, SessionPhase};
pub use token::TokenStatus;
