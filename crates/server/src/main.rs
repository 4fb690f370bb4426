//! Barberboard API server - the shared store every display converges on.
//!
//! This binary serves the record API on port 8001 (the port the shop's
//! displays are configured for).
//!
//! # Architecture
//!
//! - Axum over plain JSON files in a data directory
//! - One version document (`settings-version.json`) that doubles as the
//!   displays' static poll target
//! - Whole-record replacement with a version bump on every write
//! - Admin-token write protection with a bootstrap allowance
//!
//! The server validates nothing about record contents: displays own the
//! schemas, the server owns versioning and delivery.

#![cfg_attr(not(test), forbid(unsafe_code))]

use secrecy::ExposeSecret;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use barberboard_server::config::ServerConfig;
use barberboard_server::routes;
use barberboard_server::state::AppState;

#[tokio::main]
async fn main() {
    // Initialize tracing with EnvFilter
    // Defaults to info level for our crate if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "barberboard_server=info,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env().expect("Failed to load configuration");

    let state = AppState::new(config.clone()).expect("Failed to open data directory");
    tracing::info!(data_dir = %config.data_dir.display(), "record store opened");

    // Seed the admin token from the environment on first boot; rotation
    // afterwards goes through the API
    if let Some(token) = config.admin_token.as_ref()
        && state.store().admin_token().await.is_none()
    {
        state
            .store()
            .set_admin_token(token.expose_secret().to_string())
            .await
            .expect("Failed to install admin token");
        tracing::info!("admin token installed from environment");
    }

    let app = routes::app(state);

    let addr = config.socket_addr();
    tracing::info!("barberboard server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
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
