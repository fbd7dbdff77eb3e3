//! Coursepay server.
//!
//! Serves the checkout redirect, the gateway webhook and the operator
//! endpoints. Webhooks are acknowledged immediately and fulfilled by a
//! background worker in the same process.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use coursepay::{router, AppState, ChargilyClient, Config, ResendMailer};

const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("server_starting");

    let config = Config::from_env();
    info!(
        port = config.port,
        gateway_configured = config.gateway_secret_key.is_some(),
        static_link_configured = config.static_payment_link.is_some(),
        forwarding_configured = config.forward_webhook_url.is_some(),
        email_configured = config.email_api_key.is_some(),
        signature_policy = config.signature_policy.as_str(),
        history_size = config.webhook_history_size,
        "config_loaded"
    );

    let http = reqwest::Client::builder()
        .build()
        .context("Failed to build HTTP client")?;

    let gateway = Arc::new(ChargilyClient::from_config(http.clone(), &config));
    let mailer = Arc::new(ResendMailer::from_config(http.clone(), &config));

    let port = config.port;
    let (state, worker) = AppState::with_worker(config, gateway, mailer, http);
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "server_listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // The router (and with it the queue sender) is gone, so the worker drains
    // what is left and exits.
    if tokio::time::timeout(SHUTDOWN_DRAIN_TIMEOUT, worker).await.is_err() {
        warn!("fulfillment_drain_timeout");
    }

    info!("server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("server_shutting_down");
}
