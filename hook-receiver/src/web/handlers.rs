//! Endpoint handlers.
//!
//! The hook handler only:
//! 1. Checks the method and the shared secret
//! 2. Reads the body
//! 3. Writes one entry to the payload sink
//!
//! Each request is handled to completion before the response is sent.

use std::sync::Arc;

use axum::{
    body::{self, Body},
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::config::{Config, Formatter};
use crate::sink::{PayloadEntry, Sink};
use crate::web::auth::is_authorized;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub formatter: Formatter,
    pub sink: Arc<dyn Sink>,
    fatal: Arc<Notify>,
}

impl AppState {
    pub fn new(config: Config, sink: Arc<dyn Sink>) -> Self {
        Self {
            formatter: config.formatter,
            config: Arc::new(config),
            sink,
            fatal: Arc::new(Notify::new()),
        }
    }

    /// Completes once a handler has hit an unrecoverable sink failure.
    pub async fn fatal_error(&self) {
        self.fatal.notified().await;
    }
}

// =============================================================================
// Liveness
// =============================================================================

/// Liveness endpoint, answers any method.
pub async fn health() -> &'static str {
    "ok"
}

// =============================================================================
// Hook
// =============================================================================

/// Hook endpoint.
///
/// Non-POST requests get 405 and bad secrets get 401; neither is logged to
/// the sink. A body that cannot be read is recorded as an empty payload with
/// the read error attached, and the caller still gets 200.
pub async fn receive_hook(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Body,
) -> Response {
    if method != Method::POST {
        debug!(method = %method, "hook_method_not_allowed");
        return (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed\n").into_response();
    }

    let provided = headers
        .get(AUTHORIZATION)
        .map(|v| v.as_bytes())
        .unwrap_or_default();

    if !is_authorized(state.config.shared_secret.as_bytes(), provided) {
        warn!(has_authorization = headers.contains_key(AUTHORIZATION), "hook_unauthorized");
        return (StatusCode::UNAUTHORIZED, "Unauthorized\n").into_response();
    }

    // No cap of our own; only the HTTP stack bounds the body.
    let entry = match body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => PayloadEntry::new(&bytes),
        Err(e) => {
            warn!(error = %e, "hook_body_read_failed");
            PayloadEntry::unreadable(e)
        }
    };
    let payload_length = entry.message.len();
    let line = state.formatter.render(&entry);

    let sink = Arc::clone(&state.sink);
    let written = tokio::task::spawn_blocking(move || sink.write(line.as_bytes())).await;

    match written {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            error!(error = %e, "sink_write_failed");
            state.fatal.notify_one();
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error\n").into_response();
        }
        Err(e) => {
            error!(error = %e, "sink_write_panicked");
            state.fatal.notify_one();
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error\n").into_response();
        }
    }

    info!(payload_length, "hook_accepted");

    (StatusCode::OK, "ok").into_response()
}
