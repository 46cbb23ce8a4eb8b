// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::net::SocketAddr;

use food_rescue_portal::{
    api::router,
    config::{LogFormat, PortalConfig},
    portal::Portal,
    state::AppState,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let config = match PortalConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };
    init_tracing(config.log_format);

    let (portal, mut redirects) = match Portal::build(&config) {
        Ok(built) => built,
        Err(e) => {
            error!(error = %e, "Failed to build portal runtime");
            std::process::exit(1);
        }
    };

    let shutdown = CancellationToken::new();
    let tasks = portal.start(shutdown.clone());
    tokio::spawn(async move {
        while let Some(path) = redirects.recv().await {
            debug!(path, "Session redirect");
        }
    });

    let app = router(AppState::new(portal.backend.clone(), portal.cache.clone()));

    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!(host = %config.host, port = config.port, error = %e, "Invalid bind address");
            std::process::exit(1);
        }
    };
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(%addr, error = %e, "Failed to bind");
            std::process::exit(1);
        }
    };

    info!(
        %addr,
        backend = %config.backend_api_url,
        session_dir = %config.session_dir.display(),
        "Food rescue portal listening (docs at /docs)"
    );

    tokio::spawn(shutdown_on_signal(shutdown.clone()));
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await
    {
        error!(error = %e, "Server failed");
    }

    shutdown.cancel();
    for task in tasks {
        let _ = task.await;
    }
    info!("Shutdown complete");
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
}

async fn shutdown_on_signal(shutdown: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received");
            shutdown.cancel();
        }
        Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
    }
}
