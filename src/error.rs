//! Error types for pool construction and configuration
//!
//! Only the setup paths return errors. Misuse of a running pool (releasing
//! an unknown address, draining with chunks still lent, backend exhaustion
//! during a resize) is a bug in the caller and panics instead; the release
//! profile aborts the process on panic.

use thiserror::Error;

pub use crate::backend::{BackendError, BackendResult};

/// Configuration errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A setting has a value that cannot be used
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    /// The selected backend is not compiled into this build
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
}

/// Unified error type for building a pool
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("backend initialization failed: {0}")]
    Backend(#[from] BackendError),
}

impl PoolError {
    /// Whether the error came from user-supplied configuration
    pub fn is_config_error(&self) -> bool {
        matches!(self, PoolError::Config(_))
    }
}

/// Result type for pool setup
pub type PoolResult<T> = Result<T, PoolError>;
