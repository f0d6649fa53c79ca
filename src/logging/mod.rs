//! Logging initialization
//!
//! The pool emits `tracing` events (trace for hits and releases, debug for
//! resize-on-miss, info at drain, error before a fatal panic). This module
//! installs a `tracing-subscriber` for binaries and tests that want to see
//! them.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: standard tracing filter, takes precedence
//! - `CHUNKPOOL_LOG_LEVEL`: error, warn, info, debug, trace
//! - `CHUNKPOOL_LOG_FORMAT`: `human` or `json`

use std::str::FromStr;

use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Set once the global subscriber is installed
static TRACING_INITIALIZED: OnceCell<()> = OnceCell::new();

const LOG_LEVEL_ENV: &str = "CHUNKPOOL_LOG_LEVEL";
const LOG_FORMAT_ENV: &str = "CHUNKPOOL_LOG_FORMAT";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoggingError {
    #[error("invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("invalid log format: {0}")]
    InvalidLogFormat(String),

    #[error("a global tracing subscriber is already installed")]
    AlreadyInstalled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl FromStr for LogLevel {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(LoggingError::InvalidLogLevel(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Colored, human-readable lines
    #[default]
    Human,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" | "pretty" | "console" => Ok(LogFormat::Human),
            "json" | "structured" => Ok(LogFormat::Json),
            _ => Err(LoggingError::InvalidLogFormat(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    /// Include file and line of each event
    pub with_file_info: bool,
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_file_info(mut self, with_file_info: bool) -> Self {
        self.with_file_info = with_file_info;
        self
    }

    /// Read `CHUNKPOOL_LOG_LEVEL` and `CHUNKPOOL_LOG_FORMAT`; unset
    /// variables keep their defaults, malformed ones are errors.
    pub fn from_env() -> Result<Self, LoggingError> {
        let mut config = Self::default();
        if let Ok(level) = std::env::var(LOG_LEVEL_ENV) {
            config.level = level.parse()?;
        }
        if let Ok(format) = std::env::var(LOG_FORMAT_ENV) {
            config.format = format.parse()?;
        }
        Ok(config)
    }

    /// Filter honouring `RUST_LOG` first, then the configured level
    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.level.as_filter_str()))
    }
}

/// Initialize logging from the environment, falling back to defaults on
/// malformed variables. Idempotent.
pub fn init_logging_default() {
    let config = LoggingConfig::from_env().unwrap_or_default();
    // Another subscriber (e.g. from a test harness) is fine
    let _ = init_with_config(&config);
}

/// Install the global subscriber described by `config`.
///
/// Only the first successful call in a process has an effect; later calls
/// return `Ok(())` without changing anything.
pub fn init_with_config(config: &LoggingConfig) -> Result<(), LoggingError> {
    let mut result = Ok(());
    TRACING_INITIALIZED.get_or_init(|| {
        result = install(config);
    });
    result
}

fn install(config: &LoggingConfig) -> Result<(), LoggingError> {
    let registry = tracing_subscriber::registry().with(config.env_filter());

    let installed = match config.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(false)
                    .with_file(config.with_file_info)
                    .with_line_number(config.with_file_info),
            )
            .try_init(),
        LogFormat::Human => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_file(config.with_file_info)
                    .with_line_number(config.with_file_info),
            )
            .try_init(),
    };

    installed.map_err(|_| LoggingError::AlreadyInstalled)
}

/// Whether [`init_with_config`] has run in this process
pub fn is_initialized() -> bool {
    TRACING_INITIALIZED.get().is_some()
}
