// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

/// Health check response with individual component status.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReadyResponse {
    /// Overall health status ("ok" or "degraded").
    pub status: String,
    /// Individual health checks and their results.
    pub checks: HealthChecks,
}

/// Individual health check results.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthChecks {
    /// Whether the service process is running.
    pub service: String,
    /// Backend API reachability ("ok" or "unavailable").
    pub backend: String,
    /// Entries currently held by the resource cache.
    pub cache_entries: usize,
}

/// Simple health check response for liveness checks.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// Health check endpoint handler.
///
/// Returns 200 if the backend answers, 503 otherwise.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = ReadyResponse),
        (status = 503, description = "Backend unreachable", body = ReadyResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let backend_ok = state.backend.ping().await;

    let response = ReadyResponse {
        status: if backend_ok { "ok" } else { "degraded" }.to_string(),
        checks: HealthChecks {
            service: "ok".to_string(),
            backend: if backend_ok { "ok" } else { "unavailable" }.to_string(),
            cache_entries: state.cache.len(),
        },
    };

    let status = if backend_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}

/// Liveness check handler.
///
/// Always returns 200 if the process is running.
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn liveness() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Readiness check handler.
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Service is ready", body = ReadyResponse),
        (status = 503, description = "Service is not ready", body = ReadyResponse)
    )
)]
pub async fn readiness(state: State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    health(state).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{tests::spawn_backend, BackendClient};
    use crate::cache::ResourceCache;
    use crate::config::CacheConfig;
    use axum::Router;
    use std::sync::Arc;

    fn state(backend: BackendClient) -> AppState {
        AppState::new(backend, Arc::new(ResourceCache::new(CacheConfig::default())))
    }

    #[tokio::test]
    async fn reachable_backend_is_ok() {
        let backend = BackendClient::new(spawn_backend(Router::new()).await).unwrap();
        let (status, Json(body)) = health(State(state(backend))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.checks.backend, "ok");
        assert_eq!(body.checks.cache_entries, 0);
    }

    #[tokio::test]
    async fn unreachable_backend_degrades() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let backend =
            BackendClient::new(url::Url::parse(&format!("http://{addr}/api")).unwrap()).unwrap();

        let (status, Json(body)) = readiness(State(state(backend))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.status, "degraded");
        assert_eq!(body.checks.backend, "unavailable");
    }
}
