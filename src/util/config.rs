use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::persistence::storage::segment::SEGMENT_HEADER_LEN;

/// Environment variable overriding [`WalConfig::logs_location`].
pub const LOGS_LOCATION_ENV: &str = "GRAPHWAL_LOGS_LOCATION";

pub const DEFAULT_LOGS_LOCATION: &str = "transaction-logs";
pub const DEFAULT_ROTATION_THRESHOLD_BYTES: u64 = 256 * 1024 * 1024;
pub const DEFAULT_WRITER_BUFFER_BYTES: usize = 64 * 1024;

/// Settings shared by the append path and the recovery scan path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalConfig {
    /// Log directory, relative to the store directory or absolute.
    #[serde(default = "default_logs_location")]
    pub logs_location: String,
    /// Size at which the active segment is rotated; `0` disables size-triggered rotation.
    #[serde(default = "default_rotation_threshold")]
    pub rotation_threshold_bytes: u64,
    #[serde(default = "default_writer_buffer")]
    pub writer_buffer_bytes: usize,
}

impl Default for WalConfig {
    fn default() -> Self {
        Self {
            logs_location: default_logs_location(),
            rotation_threshold_bytes: default_rotation_threshold(),
            writer_buffer_bytes: default_writer_buffer(),
        }
    }
}

impl WalConfig {
    pub fn with_logs_location(mut self, location: impl Into<String>) -> Self {
        self.logs_location = location.into();
        self
    }

    pub fn with_rotation_threshold(mut self, bytes: u64) -> Self {
        self.rotation_threshold_bytes = bytes;
        self
    }

    /// Loads a JSON config file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = match fs::read(path.as_ref()) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => WalConfig::default(),
            Err(err) => return Err(ConfigError::Io(err)),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(value) = env::var(LOGS_LOCATION_ENV) {
            if !value.trim().is_empty() {
                self.logs_location = value;
            }
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.logs_location.trim().is_empty() {
            return Err(ConfigError::Invalid("logs_location must not be empty".into()));
        }
        if self.rotation_threshold_bytes != 0 && self.rotation_threshold_bytes <= SEGMENT_HEADER_LEN
        {
            return Err(ConfigError::Invalid(format!(
                "rotation_threshold_bytes must exceed the {SEGMENT_HEADER_LEN}-byte segment header"
            )));
        }
        if self.writer_buffer_bytes == 0 {
            return Err(ConfigError::Invalid(
                "writer_buffer_bytes must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

fn default_logs_location() -> String {
    DEFAULT_LOGS_LOCATION.to_string()
}

fn default_rotation_threshold() -> u64 {
    DEFAULT_ROTATION_THRESHOLD_BYTES
}

fn default_writer_buffer() -> usize {
    DEFAULT_WRITER_BUFFER_BYTES
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
