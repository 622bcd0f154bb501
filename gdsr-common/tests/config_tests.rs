//! Config file resolution and graceful degradation
//!
//! Tests cover:
//! - Priority order: CLI argument > GDSR_CONFIG > platform default
//! - Missing config files fall back to compiled defaults
//! - Malformed config files are reported as errors
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate GDSR_CONFIG are marked with #[serial].

use gdsr_common::config::{
    default_config_path, load_config, resolve_config_path, BrowserConfig, CONFIG_ENV_VAR,
};
use gdsr_common::Error;
use serial_test::serial;
use std::env;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn write_config(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).expect("Should write config file");
    path
}

#[test]
#[serial]
fn test_cli_argument_wins_over_env() {
    let dir = TempDir::new().unwrap();
    let cli_path = write_config(&dir, "cli.toml", "project_id = \"from-cli\"");
    let env_path = write_config(&dir, "env.toml", "project_id = \"from-env\"");
    env::set_var(CONFIG_ENV_VAR, &env_path);

    let resolved = resolve_config_path(Some(&cli_path));
    assert_eq!(resolved, Some(cli_path.clone()));

    let config = load_config(Some(&cli_path)).unwrap();
    assert_eq!(config.project_id.as_deref(), Some("from-cli"));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_env_var_used_without_cli_argument() {
    let dir = TempDir::new().unwrap();
    let env_path = write_config(
        &dir,
        "env.toml",
        "project_id = \"from-env\"\n[scroll]\nthreshold_px = 80.0\n",
    );
    env::set_var(CONFIG_ENV_VAR, &env_path);

    let config = load_config(None).unwrap();
    assert_eq!(config.project_id.as_deref(), Some("from-env"));
    assert_eq!(config.scroll.threshold_px, 80.0);

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_missing_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("does-not-exist.toml");

    let config = load_config(Some(&missing)).unwrap();
    assert_eq!(config, BrowserConfig::default());
}

#[test]
#[serial]
fn test_malformed_file_is_config_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "bad.toml", "[scroll\nthreshold_px = ");

    let err = load_config(Some(&path)).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
#[serial]
fn test_no_overrides_resolves_to_platform_default_or_none() {
    env::remove_var(CONFIG_ENV_VAR);

    match resolve_config_path(None) {
        Some(path) => assert_eq!(Some(path), default_config_path()),
        None => {
            let config = load_config(None).unwrap();
            assert_eq!(config, BrowserConfig::default());
        }
    }
}
