//! Payload sinks.
//!
//! Accepted hook payloads are rendered into one line each and handed to a
//! [`Sink`]. The sink is chosen once at startup from the configuration:
//!
//! ```text
//! OUTPUT_TYPE=stdout → ConsoleSink
//! OUTPUT_TYPE=file   → RotatingFileSink (size rotation, retention, gzip)
//! ```

pub mod console;
pub mod format;
pub mod rotating;

use std::sync::Arc;

use tracing::info;

use crate::config::{Config, OutputMode};
use crate::error::SinkError;

pub use console::ConsoleSink;
pub use format::PayloadEntry;
pub use rotating::{RotatingFileSink, RotationPolicy};

/// Destination for rendered payload entries.
///
/// Implementations are shared by every in-flight request and must tolerate
/// concurrent calls; each call carries exactly one complete entry.
pub trait Sink: Send + Sync {
    fn write(&self, line: &[u8]) -> Result<(), SinkError>;
}

/// Construct the sink selected by `config`.
pub fn build_sink(config: &Config) -> Result<Arc<dyn Sink>, SinkError> {
    match config.output_mode {
        OutputMode::Console => {
            info!(formatter = ?config.formatter, "console_sink_selected");
            Ok(Arc::new(ConsoleSink::stdout()))
        }
        OutputMode::File => {
            let policy = config.rotation();
            info!(
                path = %policy.path.display(),
                max_size_bytes = policy.max_size_bytes,
                max_backups = policy.max_backups,
                max_age_days = policy.max_age_days,
                formatter = ?config.formatter,
                "file_sink_selected"
            );
            Ok(Arc::new(RotatingFileSink::open(policy)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;

    #[test]
    fn test_build_file_sink_creates_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("hooks.log");

        let vars: HashMap<&str, String> = [
            ("OUTPUT_TYPE", "file".to_string()),
            ("FILE_LOCATION", path.display().to_string()),
        ]
        .into_iter()
        .collect();
        let config = Config::from_lookup(|name| vars.get(name).cloned()).unwrap();

        let sink = build_sink(&config).unwrap();
        sink.write(b"hello\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "hello\n");
    }

    #[test]
    fn test_build_console_sink() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert!(build_sink(&config).is_ok());
    }
}
