//! Pool configuration
//!
//! [`PoolConfig`] selects the memory backend and its parameters. Values can
//! be set programmatically or read from the environment:
//!
//! - `CHUNKPOOL_BACKEND`: `system` (default) or `hip`
//! - `CHUNKPOOL_ALIGNMENT`: host allocation alignment for the system backend
//! - `CHUNKPOOL_DEVICE`: GPU ordinal for the HIP backend
//! - `CHUNKPOOL_REPORT`: log statistics when the pool is drained (`1`/`0`)

use std::str::FromStr;

use crate::backend::SystemBackend;
use crate::error::ConfigError;

const BACKEND_ENV: &str = "CHUNKPOOL_BACKEND";
const ALIGNMENT_ENV: &str = "CHUNKPOOL_ALIGNMENT";
const DEVICE_ENV: &str = "CHUNKPOOL_DEVICE";
const REPORT_ENV: &str = "CHUNKPOOL_REPORT";

/// Which backend a pool built from configuration uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendChoice {
    /// Host allocator for both kinds
    #[default]
    System,
    /// ROCm/HIP runtime (requires the `rocm` feature)
    Hip,
}

impl FromStr for BackendChoice {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" | "host" => Ok(BackendChoice::System),
            "hip" | "rocm" => Ok(BackendChoice::Hip),
            _ => Err(ConfigError::InvalidValue {
                key: BACKEND_ENV,
                value: s.to_string(),
            }),
        }
    }
}

/// Pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Backend to allocate from
    pub backend: BackendChoice,
    /// Alignment of host allocations (system backend)
    pub alignment: usize,
    /// GPU ordinal (HIP backend)
    pub device_id: i32,
    /// Log the statistics snapshot at drain
    pub report_on_drain: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            backend: BackendChoice::System,
            alignment: SystemBackend::DEFAULT_ALIGNMENT,
            device_id: 0,
            report_on_drain: false,
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(mut self, backend: BackendChoice) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_alignment(mut self, alignment: usize) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn with_device_id(mut self, device_id: i32) -> Self {
        self.device_id = device_id;
        self
    }

    pub fn with_report_on_drain(mut self, report_on_drain: bool) -> Self {
        self.report_on_drain = report_on_drain;
        self
    }

    /// Build a configuration from defaults overridden by `CHUNKPOOL_*`
    /// environment variables. The result is validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(BACKEND_ENV) {
            config.backend = value.parse()?;
        }
        if let Some(value) = lookup(ALIGNMENT_ENV) {
            config.alignment = parse_value(ALIGNMENT_ENV, &value)?;
        }
        if let Some(value) = lookup(DEVICE_ENV) {
            config.device_id = parse_value(DEVICE_ENV, &value)?;
        }
        if let Some(value) = lookup(REPORT_ENV) {
            config.report_on_drain = match value.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: REPORT_ENV,
                        value,
                    })
                }
            };
        }

        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration can be used in this build
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.alignment.is_power_of_two() {
            return Err(ConfigError::InvalidValue {
                key: ALIGNMENT_ENV,
                value: self.alignment.to_string(),
            });
        }
        if self.device_id < 0 {
            return Err(ConfigError::InvalidValue {
                key: DEVICE_ENV,
                value: self.device_id.to_string(),
            });
        }
        if self.backend == BackendChoice::Hip && !cfg!(feature = "rocm") {
            return Err(ConfigError::BackendUnavailable(
                "HIP backend requires the `rocm` feature".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_value<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}
