// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{env, process};

use solace_server::{
    api::router,
    config::{AuthSettings, ServerConfig, LOG_FORMAT_ENV},
    state::AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    match env::var(LOG_FORMAT_ENV).as_deref() {
        Ok("json") => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        _ => registry.with(tracing_subscriber::fmt::layer().pretty()).init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
}

#[tokio::main]
async fn main() {
    init_tracing();

    let (server, auth) = match ServerConfig::from_env().and_then(|server| {
        AuthSettings::from_env().map(|auth| (server, auth))
    }) {
        Ok(loaded) => loaded,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            process::exit(1);
        }
    };

    let addr = match server.bind_addr() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!(error = %e, "Invalid bind address");
            process::exit(1);
        }
    };

    let verifier = match auth.build_verifier() {
        Ok(verifier) => verifier,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build token verifier");
            process::exit(1);
        }
    };

    tracing::info!(
        mode = %verifier.keys().mode(),
        algorithm = ?verifier.keys().algorithm(),
        leeway_secs = verifier.policy().leeway_secs(),
        "Token verifier ready"
    );

    // Warm the key cache so the first request does not pay for the fetch.
    if let Some(jwks) = verifier.keys().jwks_manager() {
        match jwks.refresh().await {
            Ok(keys) => tracing::info!(keys = keys.len(), url = %jwks.jwks_url(), "JWKS warmed"),
            Err(e) => tracing::warn!(error = %e, url = %jwks.jwks_url(), "JWKS warm-up failed, will retry on demand"),
        }
    }

    let app = router(AppState::new(verifier));

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, %addr, "Failed to bind listener");
            process::exit(1);
        }
    };

    tracing::info!(%addr, "Solace server listening (docs at /docs)");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server error");
        process::exit(1);
    }
}
