// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP client for the rewards backend API.
//!
//! Every backend reply is either a bare JSON value or a `{ "data": ... }`
//! envelope; [`unwrap_envelope`] collapses both to the payload.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::cache::Fetcher;
use crate::error::{PortalError, PortalResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Shared backend client (cheap to clone).
#[derive(Debug, Clone)]
pub struct BackendClient {
    base_url: Url,
    http: Client,
}

impl BackendClient {
    pub fn new(base_url: Url) -> PortalResult<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PortalError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { base_url, http })
    }

    /// Absolute URL of `path` under the base URL.
    ///
    /// Unlike `Url::join`, the last base segment is kept: `.../api` +
    /// `event` is `.../api/event`.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// `GET` an absolute URL and return the unwrapped payload.
    pub async fn get_data(&self, url: &str, token: Option<&str>) -> PortalResult<Value> {
        self.send(with_bearer(self.http.get(url), token)).await
    }

    /// `POST` JSON to an absolute URL and return the unwrapped payload.
    pub async fn post_data<B: Serialize + ?Sized>(
        &self,
        url: &str,
        token: Option<&str>,
        body: &B,
    ) -> PortalResult<Value> {
        self.send(with_bearer(self.http.post(url), token).json(body))
            .await
    }

    /// Whether the backend answers HTTP at all (any status counts).
    pub async fn ping(&self) -> bool {
        self.http.get(self.base_url.clone()).send().await.is_ok()
    }

    async fn send(&self, request: RequestBuilder) -> PortalResult<Value> {
        let response = request.send().await?;
        let status = response.status();
        let url = response.url().clone();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(%url, %status, "Backend request failed");
            return Err(PortalError::from_status(status, error_message(&body)));
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        let value: Value = serde_json::from_slice(&bytes)
            .map_err(|e| PortalError::MalformedResponse(format!("{url}: {e}")))?;

        Ok(unwrap_envelope(value))
    }
}

impl Fetcher for BackendClient {
    fn url_for(&self, path: &str) -> String {
        self.endpoint(path)
    }

    async fn fetch(&self, url: &str, token: &str) -> PortalResult<Value> {
        self.get_data(url, Some(token)).await
    }

    async fn submit(&self, url: &str, token: &str, body: &Value) -> PortalResult<Value> {
        self.post_data(url, Some(token), body).await
    }
}

fn with_bearer(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

/// Collapse a `{ "data": ... }` envelope to its payload.
pub fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Best-effort human message from an error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.chars().take(200).collect())
}
