//! Integration tests for configuration validation

#![allow(clippy::expect_used, clippy::panic)]

use std::path::PathBuf;
use std::time::Duration;

use proto_proxy::config::{ProxyConfig, DEFAULT_UPSTREAM_PORT};
use proto_proxy::error::ProxyError;
use tracing::Level;

#[test]
fn test_default_config_validates() {
    let config = ProxyConfig::default();
    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Default config should be valid, but got errors: {:?}",
        errors
    );
}

#[test]
fn test_invalid_listen_address() {
    let mut config = ProxyConfig::default();
    config.listen.address = "invalid_address".to_string();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Invalid listen address")));
}

#[test]
fn test_empty_listen_address() {
    let mut config = ProxyConfig::default();
    config.listen.address = String::new();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("cannot be empty")));
}

#[test]
fn test_long_shutdown_timeout() {
    let config = ProxyConfig::default_with_overrides(|c| {
        c.listen.shutdown_timeout = Duration::from_secs(120);
    });
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("Shutdown timeout too long")));
}

#[test]
fn test_empty_upstream_host() {
    let mut config = ProxyConfig::default();
    config.upstream.host = String::new();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Upstream host cannot be empty")));
}

#[test]
fn test_zero_upstream_port() {
    let mut config = ProxyConfig::default();
    config.upstream.port = 0;

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Upstream port must be greater than 0")));
}

#[test]
fn test_tiny_queue_capacity() {
    let mut config = ProxyConfig::default();
    config.relay.queue_capacity = 100;
    config.relay.read_chunk_size = 64;

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Queue capacity too small")));
}

#[test]
fn test_chunk_larger_than_queue() {
    let mut config = ProxyConfig::default();
    config.relay.queue_capacity = 4096;
    config.relay.read_chunk_size = 8192;

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("cannot be larger than queue capacity")));
}

#[test]
fn test_zero_blob_limit() {
    let mut config = ProxyConfig::default();
    config.relay.max_encrypted_blob = 0;

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Max encrypted blob must be greater than 0")));
}

#[test]
fn test_missing_private_key_file() {
    let mut config = ProxyConfig::default();
    config.keys.private_key_path = Some(PathBuf::from("/nonexistent/proxy-key.pem"));

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Private key file does not exist")));
}

#[test]
fn test_invalid_key_size() {
    let mut config = ProxyConfig::default();
    config.keys.key_bits = 256;

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Invalid key size")));
}

#[test]
fn test_empty_app_name() {
    let mut config = ProxyConfig::default();
    config.logging.app_name = String::new();

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Application name cannot be empty")));
}

#[test]
fn test_log_to_file_without_path() {
    let mut config = ProxyConfig::default();
    config.logging.log_to_file = true;
    config.logging.log_file_path = None;

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("log_file_path must be specified")));
}

#[test]
fn test_no_logging_outputs() {
    let mut config = ProxyConfig::default();
    config.logging.log_to_console = false;
    config.logging.log_to_file = false;

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("At least one logging output")));
}

#[test]
fn test_validate_strict_with_invalid_config() {
    let mut config = ProxyConfig::default();
    config.upstream.host = String::new();
    config.relay.max_encrypted_blob = 0;

    match config.validate_strict() {
        Err(ProxyError::ConfigError(message)) => {
            assert!(message.contains("Upstream host"));
            assert!(message.contains("Max encrypted blob"));
        }
        other => panic!("expected a config error, got {other:?}"),
    }
}

#[test]
fn test_partial_toml_keeps_defaults() {
    let config = ProxyConfig::from_toml(
        r#"
        [upstream]
        host = "play.example.net"

        [logging]
        log_level = "trace"
        hex_dumps = true
        "#,
    )
    .expect("partial config parses");

    assert_eq!(config.upstream.host, "play.example.net");
    assert_eq!(config.upstream.port, DEFAULT_UPSTREAM_PORT);
    assert_eq!(config.logging.log_level, Level::TRACE);
    assert!(config.logging.hex_dumps);
    assert_eq!(config.upstream_address(), "play.example.net:25565");
    assert!(config.validate().is_empty());
}

#[test]
fn test_bad_toml_is_a_config_error() {
    assert!(matches!(
        ProxyConfig::from_toml("[upstream]\nport = \"not a number\""),
        Err(ProxyError::ConfigError(_))
    ));
}
