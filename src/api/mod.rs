// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::Request, middleware, routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::state::AppState;

pub mod guard;
pub mod health;
pub mod pages;

pub fn router(state: AppState) -> Router {
    let page_routes = Router::new()
        .route("/", get(pages::login))
        .route("/dashboard", get(pages::dashboard))
        .route("/dashboard/{*section}", get(pages::dashboard_section))
        .layer(middleware::from_fn(guard::route_guard));

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state);

    Router::new()
        .merge(page_routes)
        .merge(health_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
                    let request_id = request
                        .headers()
                        .get("x-request-id")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default();
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id
                    )
                }))
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(health::health, health::liveness, health::readiness),
    components(schemas(health::ReadyResponse, health::HealthChecks, health::HealthResponse)),
    tags(
        (name = "Health", description = "Service and backend health")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{tests::spawn_backend, BackendClient};
    use crate::cache::ResourceCache;
    use crate::config::CacheConfig;
    use crate::session::{tests::sample_session, MemoryStore, SessionStore};
    use axum::{
        body::Body,
        http::{header, StatusCode},
        response::Response,
    };
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn app() -> Router {
        let backend = BackendClient::new(spawn_backend(Router::new()).await).unwrap();
        router(AppState::new(
            backend,
            Arc::new(ResourceCache::new(CacheConfig::default())),
        ))
    }

    async fn send(app: Router, uri: &str, headers: &[(header::HeaderName, String)]) -> Response {
        let mut request = axum::http::Request::builder().uri(uri);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        app.oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    fn location(response: &Response) -> &str {
        response.headers()[header::LOCATION].to_str().unwrap()
    }

    #[tokio::test]
    async fn protected_page_without_token_redirects_to_login() {
        let response = send(app().await, "/dashboard/x", &[]).await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(location(&response), "/");
    }

    #[tokio::test]
    async fn login_with_token_redirects_to_dashboard() {
        let response = send(
            app().await,
            "/",
            &[(header::COOKIE, "token=abc".to_string())],
        )
        .await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(location(&response), "/dashboard");
    }

    #[tokio::test]
    async fn session_cookies_open_the_dashboard() {
        let store = SessionStore::new(MemoryStore::new());
        store.persist(&sample_session("0xabc")).unwrap();
        let cookie = store.cookies().header_value().unwrap();

        let response = send(app().await, "/dashboard/rewards", &[(header::COOKIE, cookie)]).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn bearer_header_opens_the_dashboard() {
        let response = send(
            app().await,
            "/dashboard",
            &[(header::AUTHORIZATION, "Bearer abc".to_string())],
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn login_page_is_public() {
        let response = send(app().await, "/", &[]).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn health_is_not_guarded_and_carries_request_id() {
        let response = send(app().await, "/health/live", &[]).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }
}
