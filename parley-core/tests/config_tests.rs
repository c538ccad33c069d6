// ABOUTME: Tests for configuration loading and validation
// ABOUTME: Verifies TOML parsing, env var overrides, and validation errors

use parley_core::config::Config;
use serial_test::serial;
use std::io::Write;
use std::time::Duration;

/// Helper to clear all config-related env vars
fn clear_config_env_vars() {
    for key in [
        "PARLEY_CONFIG_PATH",
        "BACKEND_URL",
        "PARLEY_REFRESH_INTERVAL_MS",
        "PARLEY_REFRESH_WHILE_DISCONNECTED",
        "PARLEY_DEFAULT_MODEL",
        "PARLEY_HANDSHAKE_TIMEOUT_SECS",
        "PARLEY_HEALTH_TIMEOUT_SECS",
    ] {
        std::env::remove_var(key);
    }
}

fn write_config(dir: &tempfile::TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("parley.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

#[test]
#[serial]
fn test_config_loads_from_toml_file() {
    clear_config_env_vars();
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
[relay]
endpoint = "https://chat.example.com"
health_timeout_secs = 2

[refresh]
interval_ms = 500

[chat]
default_model = "mistral"
username = "alice"
"#,
    );
    std::env::set_var("PARLEY_CONFIG_PATH", &path);

    let config = Config::load().unwrap();

    assert_eq!(config.relay.endpoint, "https://chat.example.com");
    assert_eq!(config.health_timeout(), Duration::from_secs(2));
    assert_eq!(config.refresh_policy().interval, Duration::from_millis(500));
    assert_eq!(config.chat.default_model, "mistral");
    assert_eq!(config.chat.username.as_deref(), Some("alice"));

    clear_config_env_vars();
}

#[test]
#[serial]
fn test_config_env_var_overrides() {
    clear_config_env_vars();
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
[relay]
endpoint = "http://from-file:3001"
"#,
    );
    std::env::set_var("PARLEY_CONFIG_PATH", &path);
    std::env::set_var("BACKEND_URL", "wss://override.example.com");
    std::env::set_var("PARLEY_REFRESH_INTERVAL_MS", "750");
    std::env::set_var("PARLEY_REFRESH_WHILE_DISCONNECTED", "true");
    std::env::set_var("PARLEY_DEFAULT_MODEL", "neural-chat");
    std::env::set_var("PARLEY_HANDSHAKE_TIMEOUT_SECS", "3");

    let config = Config::load().unwrap();

    assert_eq!(config.relay.endpoint, "wss://override.example.com");
    assert_eq!(config.refresh.interval_ms, 750);
    assert!(config.refresh.while_disconnected);
    assert_eq!(config.chat.default_model, "neural-chat");
    assert_eq!(config.handshake_timeout(), Duration::from_secs(3));

    clear_config_env_vars();
}

#[test]
#[serial]
fn test_config_invalid_numeric_env_var() {
    clear_config_env_vars();
    std::env::set_var("PARLEY_CONFIG_PATH", "/nonexistent/parley.toml");
    std::env::set_var("PARLEY_REFRESH_INTERVAL_MS", "soon");

    let err = Config::load().unwrap_err();

    assert!(format!("{:#}", err).contains("PARLEY_REFRESH_INTERVAL_MS"));
    clear_config_env_vars();
}

#[test]
#[serial]
fn test_config_rejects_bad_endpoint_scheme() {
    clear_config_env_vars();
    std::env::set_var("PARLEY_CONFIG_PATH", "/nonexistent/parley.toml");
    std::env::set_var("BACKEND_URL", "gopher://relay.example.com");

    let err = Config::load().unwrap_err();

    assert!(err.to_string().contains("http, https, ws or wss"));
    clear_config_env_vars();
}

#[test]
#[serial]
fn test_config_parse_error_names_file() {
    clear_config_env_vars();
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[relay\nendpoint = 3");
    std::env::set_var("PARLEY_CONFIG_PATH", &path);

    let err = Config::load().unwrap_err();

    assert!(err.to_string().contains("Failed to parse"));
    clear_config_env_vars();
}
