//! Configuration module for environment variable parsing.
//!
//! All options are read once at startup. Unset or empty variables take their
//! defaults; a value that is present but malformed is a fatal error.

use std::env;
use std::fmt;
use std::path::PathBuf;

use tracing::warn;

use crate::error::ConfigError;
use crate::sink::RotationPolicy;

pub const DEFAULT_FILE_LOCATION: &str = "/tmp/adaptive.log";
pub const DEFAULT_MAX_SIZE_MB: u64 = 10;
pub const DEFAULT_MAX_BACKUPS: u64 = 3;
pub const DEFAULT_MAX_AGE_DAYS: u64 = 28;
pub const DEFAULT_PORT: u16 = 8080;

/// Where accepted payloads are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Standard output, never rotated.
    Console,
    /// Size/age rotated file.
    File,
}

impl OutputMode {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "stdout" => OutputMode::Console,
            "file" => OutputMode::File,
            other => {
                warn!(env_var = "OUTPUT_TYPE", value = %other, "Unknown output type, using stdout");
                OutputMode::Console
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputMode::Console => "stdout",
            OutputMode::File => "file",
        }
    }
}

/// Line format of payload entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Formatter {
    Plain,
    Json,
}

impl Formatter {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Formatter::Json,
            "" | "plain" | "text" => Formatter::Plain,
            other => {
                warn!(env_var = "FORMATTER", value = %other, "Unknown formatter, using plain text");
                Formatter::Plain
            }
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    /// Exact value required in the `Authorization` header of hook requests
    pub shared_secret: String,

    /// Payload destination
    pub output_mode: OutputMode,

    /// Active log file when writing to a file
    pub file_location: PathBuf,

    /// Size in megabytes at which the log file is rotated
    pub max_size_mb: u64,

    /// Number of rotated files to retain (0 keeps all)
    pub max_backups: u64,

    /// Days to retain rotated files (0 disables age pruning)
    pub max_age_days: u64,

    /// Port for the web server to listen on
    pub port: u16,

    /// Payload entry format
    pub formatter: Formatter,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Resolve configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as unset.
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let port = match get("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(raw))?,
            None => DEFAULT_PORT,
        };

        Ok(Config {
            shared_secret: get("SHARED_SECRET").unwrap_or_default(),
            output_mode: OutputMode::parse(&get("OUTPUT_TYPE").unwrap_or_default()),
            file_location: get("FILE_LOCATION")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_FILE_LOCATION)),
            max_size_mb: parse_u64("MAX_SIZE", get("MAX_SIZE"), DEFAULT_MAX_SIZE_MB)?,
            max_backups: parse_u64("MAX_BACKUP", get("MAX_BACKUP"), DEFAULT_MAX_BACKUPS)?,
            max_age_days: parse_u64("MAX_AGE", get("MAX_AGE"), DEFAULT_MAX_AGE_DAYS)?,
            port,
            formatter: Formatter::parse(&get("FORMATTER").unwrap_or_default()),
        })
    }

    /// Rotation settings for the file sink.
    pub fn rotation(&self) -> RotationPolicy {
        RotationPolicy {
            path: self.file_location.clone(),
            max_size_bytes: self.max_size_mb.saturating_mul(1024 * 1024),
            max_backups: self.max_backups as usize,
            max_age_days: self.max_age_days,
            compress: true,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("shared_secret", &"<redacted>")
            .field("output_mode", &self.output_mode)
            .field("file_location", &self.file_location)
            .field("max_size_mb", &self.max_size_mb)
            .field("max_backups", &self.max_backups)
            .field("max_age_days", &self.max_age_days)
            .field("port", &self.port)
            .field("formatter", &self.formatter)
            .finish()
    }
}

/// Parse an optional integer variable, failing on anything malformed.
fn parse_u64(var: &'static str, raw: Option<String>, default: u64) -> Result<u64, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidInteger { var, value }),
    }
}
