//! Web server module for receiving webhook callbacks.
//!
//! Two routes:
//! - `/healthz`: liveness probe, any method
//! - `/api/hook`: authenticated POST whose body is written to the payload sink

pub mod auth;
pub mod handlers;

use std::future::{Future, IntoFuture};

use anyhow::{anyhow, Context, Result};
use axum::{routing::any, Router};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::error;

pub use auth::{is_authorized, is_secret_configured};
pub use handlers::{health, receive_hook, AppState};

/// Build the router for the given state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", any(health))
        .route("/api/hook", any(receive_hook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve requests on `listener` until `shutdown` completes or the sink fails.
///
/// A shutdown signal drains in-flight connections. A sink failure returns an
/// error immediately without waiting for them.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let server = axum::serve(listener, router(state.clone())).with_graceful_shutdown(shutdown);

    tokio::select! {
        result = server.into_future() => result.context("Server error"),
        _ = state.fatal_error() => {
            error!("sink_failure_stopping_server");
            Err(anyhow!("payload sink failed, server stopped"))
        }
    }
}
