// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Error taxonomy shared by the session, auth and cache layers.
//!
//! No variant is fatal: every path that produces one degrades to a
//! logged-out, empty-data state.

use reqwest::StatusCode;

/// Portal error type.
///
/// Errors are stored inside cache entries and handed to every consumer of a
/// key, so the type is `Clone` and carries rendered messages instead of
/// source errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortalError {
    /// No session, or the session was rejected by the backend
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Transport-level failure talking to the backend
    #[error("Network error: {0}")]
    Network(String),

    /// Persisted session belongs to a different wallet than the connected one
    #[error("Session wallet {stored} does not match connected wallet {connected}")]
    IdentityMismatch { stored: String, connected: String },

    /// Persisted session could not be parsed
    #[error("Persisted session is malformed: {0}")]
    MalformedPersistedState(String),

    /// Backend answered with a non-success status
    #[error("Backend returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// Backend answered 2xx but the body was not the expected shape
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Durable key-value store write failed
    #[error("Storage error: {0}")]
    Storage(String),
}

impl PortalError {
    /// Stable machine-readable code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            PortalError::NotAuthenticated => "not_authenticated",
            PortalError::Network(_) => "network_error",
            PortalError::IdentityMismatch { .. } => "identity_mismatch",
            PortalError::MalformedPersistedState(_) => "malformed_persisted_state",
            PortalError::Api { .. } => "api_error",
            PortalError::MalformedResponse(_) => "malformed_response",
            PortalError::Storage(_) => "storage_error",
        }
    }

    /// Whether the cache layer should retry the request that produced this.
    pub fn is_retryable(&self) -> bool {
        match self {
            PortalError::Network(_) => true,
            PortalError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Map a non-success backend status to an error.
    pub fn from_status(status: StatusCode, message: impl Into<String>) -> Self {
        if status == StatusCode::UNAUTHORIZED {
            PortalError::NotAuthenticated
        } else {
            PortalError::Api {
                status: status.as_u16(),
                message: message.into(),
            }
        }
    }
}

impl From<reqwest::Error> for PortalError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            PortalError::MalformedResponse(e.to_string())
        } else if let Some(status) = e.status() {
            PortalError::from_status(status, e.to_string())
        } else {
            PortalError::Network(e.to_string())
        }
    }
}

/// Result alias for portal operations.
pub type PortalResult<T> = Result<T, PortalError>;
