#[path = "../support/env.rs"]
mod env_support;

use env_support::EnvVarGuard;
use graphwal::persistence::storage::{resolve_logs_dir, StoreLayout};
use graphwal::util::{ConfigError, WalConfig, LOGS_LOCATION_ENV};
use std::fs;
use tempfile::tempdir;

#[test]
fn env_override_replaces_configured_location() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.json");
    fs::write(&path, br#"{"logs_location":"from-file"}"#).unwrap();

    let _guard = EnvVarGuard::set(LOGS_LOCATION_ENV, "from-env");
    let config = WalConfig::load(&path).unwrap().with_env_overrides();
    assert_eq!(config.logs_location, "from-env");
    assert_eq!(
        StoreLayout::new(dir.path()).logs_dir(&config),
        dir.path().join("from-env")
    );
}

#[test]
fn blank_env_override_is_ignored() {
    let _guard = EnvVarGuard::set(LOGS_LOCATION_ENV, "   ");
    let config = WalConfig::default().with_env_overrides();
    assert_eq!(config, WalConfig::default());
}

#[test]
fn unset_env_keeps_file_value() {
    let _guard = EnvVarGuard::clear(LOGS_LOCATION_ENV);
    let config = WalConfig::default()
        .with_logs_location("kept")
        .with_env_overrides();
    assert_eq!(config.logs_location, "kept");
}

#[test]
fn malformed_file_is_a_serialization_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.json");
    fs::write(&path, b"{not json").unwrap();
    assert!(matches!(
        WalConfig::load(&path),
        Err(ConfigError::Serialization(_))
    ));
}

#[test]
fn resolution_folds_relative_components() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("store");
    assert_eq!(
        resolve_logs_dir(&store, "./a/../logs"),
        resolve_logs_dir(&store, store.join("logs").to_str().unwrap())
    );
}
