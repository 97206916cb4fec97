//! Tracing subscriber setup.

use crate::config::{LogFormat, LoggingConfig};
use std::fs::OpenOptions;
use std::sync::Mutex;
use thiserror::Error;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

/// Errors raised while installing the global subscriber.
#[derive(Error, Debug)]
pub enum LoggingError {
    /// Log file could not be opened
    #[error("Failed to open log file: {0}")]
    Io(#[from] std::io::Error),

    /// Configured level is not a valid filter directive
    #[error("Invalid log filter '{directive}': {reason}")]
    Filter { directive: String, reason: String },

    /// A global subscriber is already installed
    #[error("Failed to initialize tracing subscriber: {0}")]
    Init(String),
}

/// Installs the global subscriber described by `config`.
///
/// `RUST_LOG`, when set, takes precedence over `config.level`. Calling
/// this twice returns [`LoggingError::Init`]; callers that may initialise
/// more than once (tests, embedding applications) can ignore that error.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = build_filter(&config.level)?;

    let writer = match &config.file_path {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };
    let ansi = config.file_path.is_none();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(false);

    let result = match config.format {
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    result.map_err(|e| LoggingError::Init(e.to_string()))
}

fn build_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    EnvFilter::try_new(level.to_lowercase()).map_err(|e| LoggingError::Filter {
        directive: level.to_string(),
        reason: e.to_string(),
    })
}
