//! Shared configuration and error types.

pub mod config;
pub mod error;

pub use config::{ConfigError, WalConfig, LOGS_LOCATION_ENV};
pub use error::DurabilityError;
