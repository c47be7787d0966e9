//! Error types for configuration and payload sinks.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Configuration could not be resolved from the environment.
///
/// Every variant is fatal: the server must not start on a bad configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be a non-negative integer, got {value:?}")]
    InvalidInteger { var: &'static str, value: String },

    #[error("PORT must be a port number between 0 and 65535, got {0:?}")]
    InvalidPort(String),
}

/// Writing to a payload sink failed.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to open log file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write log entry: {0}")]
    Write(#[from] io::Error),

    #[error("failed to rotate log file {path}: {source}")]
    Rotate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to compress rotated log {path}: {source}")]
    Compress {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
