// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Client for the backend's wallet-signature auth endpoints.

use serde::Deserialize;
use serde_json::json;

use crate::backend::BackendClient;
use crate::error::{PortalError, PortalResult};
use crate::session::Session;

#[derive(Debug, Deserialize)]
struct NonceResponse {
    nonce: String,
}

/// `POST /auth/nonce` and `POST /auth/verify`.
#[derive(Debug, Clone)]
pub struct AuthApi {
    backend: BackendClient,
}

impl AuthApi {
    pub fn new(backend: BackendClient) -> Self {
        Self { backend }
    }

    /// Fetch the challenge the wallet has to sign.
    pub async fn request_nonce(&self, wallet_address: &str) -> PortalResult<String> {
        let value = self
            .backend
            .post_data(
                &self.backend.endpoint("auth/nonce"),
                None,
                &json!({ "walletAddress": wallet_address }),
            )
            .await?;

        let response: NonceResponse = serde_json::from_value(value)
            .map_err(|e| PortalError::MalformedResponse(format!("nonce: {e}")))?;
        Ok(response.nonce)
    }

    /// Exchange a signed challenge for a session.
    pub async fn verify(&self, wallet_address: &str, signature: &str) -> PortalResult<Session> {
        let value = self
            .backend
            .post_data(
                &self.backend.endpoint("auth/verify"),
                None,
                &json!({ "walletAddress": wallet_address, "signature": signature }),
            )
            .await?;

        serde_json::from_value(value)
            .map_err(|e| PortalError::MalformedResponse(format!("verify: {e}")))
    }
}
