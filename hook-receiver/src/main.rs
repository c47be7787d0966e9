//! Hookd - webhook receiver entrypoint.
//!
//! Reads configuration from the environment, selects the payload sink and
//! serves `/healthz` and `/api/hook` until a shutdown signal arrives or the
//! sink fails. A sink failure exits non-zero without draining connections.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hookd::web::{is_secret_configured, serve};
use hookd::{build_sink, AppState, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Structured JSON logging on stderr; stdout may carry payload entries.
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true).with_writer(std::io::stderr))
        .init();

    info!("web_server_starting");

    // Load configuration
    let config = Config::from_env().context("Invalid configuration")?;
    info!(
        port = config.port,
        output_type = config.output_mode.as_str(),
        formatter = ?config.formatter,
        shared_secret_configured = is_secret_configured(&config.shared_secret),
        "config_loaded"
    );

    if !is_secret_configured(&config.shared_secret) {
        warn!("shared_secret_empty: requests without an Authorization header will be accepted");
    }

    let sink = build_sink(&config).context("Failed to open payload sink")?;

    let port = config.port;
    let state = AppState::new(config, sink);

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    serve(listener, state, shutdown_signal()).await?;

    info!("web_server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "ctrl_c_handler_failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "sigterm_handler_failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("web_server_shutting_down");
}
