//! Sundry cart API - authoritative cart and catalog service binary.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::fs;
use std::path::Path;
use std::sync::Arc;

use sundry_core::CatalogRecord;

use sundry_cart_api::{ApiConfig, ApiState, StaticTokenVerifier, app};

#[tokio::main]
async fn main() {
    let config = ApiConfig::from_env().expect("Failed to load configuration");

    // Defaults to info level for our crate if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "sundry_cart_api=info,tower_http=debug".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let catalog = config
        .catalog_seed
        .as_deref()
        .map_or_else(Vec::new, load_catalog_seed);
    tracing::info!(records = catalog.len(), "catalog loaded");

    let verifier = Arc::new(StaticTokenVerifier::new(config.tokens.clone()));
    let state = ApiState::new(verifier, catalog);

    let addr = config.socket_addr();
    tracing::info!("cart-api listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

/// Load catalog records from a JSON seed file.
fn load_catalog_seed(path: &Path) -> Vec<CatalogRecord> {
    let raw = fs::read_to_string(path).expect("Failed to read catalog seed");
    serde_json::from_str(&raw).expect("Failed to parse catalog seed")
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
