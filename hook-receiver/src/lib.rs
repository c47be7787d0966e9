//! Hookd - minimal authenticated webhook receiver.
//!
//! Accepts webhook callbacks over HTTP, checks them against a shared secret
//! and writes each payload as one log entry to standard output or to a
//! size-rotated file.
//!
//! ## Architecture
//!
//! ```text
//! Config (env) → build_sink → AppState → router → /api/hook → Sink
//! ```

pub mod config;
pub mod error;
pub mod sink;
pub mod web;

// Re-export commonly used types
pub use config::{Config, Formatter, OutputMode};
pub use error::{ConfigError, SinkError};
pub use sink::{build_sink, ConsoleSink, PayloadEntry, RotatingFileSink, RotationPolicy, Sink};
pub use web::{router, AppState};
