//! # Configuration Management
//!
//! Configuration for the proxy service.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides (`PROTO_PROXY_*`) via `from_env()`
//!
//! ## Example
//! ```toml
//! [listen]
//! address = "0.0.0.0:25564"
//!
//! [upstream]
//! host = "127.0.0.1"
//! port = 25565
//!
//! [logging]
//! log_level = "debug"
//! hex_dumps = true
//! ```

use crate::core::queue::DEFAULT_QUEUE_CAPACITY;
use crate::error::{ProxyError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

/// Default port the proxy listens on
pub const DEFAULT_LISTEN_PORT: u16 = 25564;

/// Default port of the real server
pub const DEFAULT_UPSTREAM_PORT: u16 = 25565;

/// Longest encrypted handshake field accepted from a client
pub const DEFAULT_MAX_ENCRYPTED_BLOB: usize = 1024;

/// Main proxy configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ProxyConfig {
    /// Where the proxy accepts clients
    #[serde(default)]
    pub listen: ListenConfig,

    /// The real server
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Relay buffer limits
    #[serde(default)]
    pub relay: RelayConfig,

    /// Proxy key material
    #[serde(default)]
    pub keys: KeyConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ProxyConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProxyError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProxyError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProxyError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("PROTO_PROXY_LISTEN_ADDRESS") {
            config.listen.address = addr;
        }

        if let Ok(host) = std::env::var("PROTO_PROXY_UPSTREAM_HOST") {
            config.upstream.host = host;
        }

        if let Ok(port) = std::env::var("PROTO_PROXY_UPSTREAM_PORT") {
            config.upstream.port = port.parse::<u16>().map_err(|e| {
                ProxyError::ConfigError(format!("Invalid PROTO_PROXY_UPSTREAM_PORT '{port}': {e}"))
            })?;
        }

        if let Ok(path) = std::env::var("PROTO_PROXY_PRIVATE_KEY") {
            config.keys.private_key_path = Some(PathBuf::from(path));
        }

        if let Ok(level) = std::env::var("PROTO_PROXY_LOG_LEVEL") {
            config.logging.log_level = level.parse::<Level>().map_err(|e| {
                ProxyError::ConfigError(format!("Invalid PROTO_PROXY_LOG_LEVEL '{level}': {e}"))
            })?;
        }

        if let Ok(path) = std::env::var("PROTO_PROXY_LOG_FILE") {
            config.logging.log_to_file = true;
            config.logging.log_file_path = Some(path);
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// `host:port` of the real server
    pub fn upstream_address(&self) -> String {
        format!("{}:{}", self.upstream.host, self.upstream.port)
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.listen.validate());
        errors.extend(self.upstream.validate());
        errors.extend(self.relay.validate());
        errors.extend(self.keys.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProxyError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Listener configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenConfig {
    /// Listen address (e.g., "0.0.0.0:25564")
    pub address: String,
    /// How long shutdown waits for open sessions
    #[serde(with = "duration_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            address: format!("0.0.0.0:{DEFAULT_LISTEN_PORT}"),
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

impl ListenConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Listen address cannot be empty".to_string());
        } else if self.address.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "Invalid listen address format: '{}' (expected format: '0.0.0.0:25564')",
                self.address
            ));
        }

        if self.shutdown_timeout.as_secs() > 60 {
            errors.push("Shutdown timeout too long (maximum: 60s)".to_string());
        }

        errors
    }
}

/// The real server the proxy connects to for each client
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub host: String,
    /// Also written into the client handshake forwarded to the server
    pub port: u16,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            host: String::from("127.0.0.1"),
            port: DEFAULT_UPSTREAM_PORT,
        }
    }
}

impl UpstreamConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.host.is_empty() {
            errors.push("Upstream host cannot be empty".to_string());
        }
        if self.port == 0 {
            errors.push("Upstream port must be greater than 0".to_string());
        }

        errors
    }
}

/// Relay buffer limits
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Bound on the bytes queued per direction
    pub queue_capacity: usize,
    /// Bytes requested per socket read
    pub read_chunk_size: usize,
    /// Longest encrypted handshake field accepted from a client
    pub max_encrypted_blob: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            read_chunk_size: 64 * 1024,
            max_encrypted_blob: DEFAULT_MAX_ENCRYPTED_BLOB,
        }
    }
}

impl RelayConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.queue_capacity < 1024 {
            errors.push("Queue capacity too small (minimum: 1 KB)".to_string());
        } else if self.queue_capacity > 64 * 1024 * 1024 {
            errors.push(format!(
                "Queue capacity too large: {} bytes (maximum recommended: 64 MB)",
                self.queue_capacity
            ));
        }

        if self.read_chunk_size == 0 {
            errors.push("Read chunk size must be greater than 0".to_string());
        } else if self.read_chunk_size > self.queue_capacity {
            errors.push("Read chunk size cannot be larger than queue capacity".to_string());
        }

        if self.max_encrypted_blob == 0 {
            errors.push("Max encrypted blob must be greater than 0".to_string());
        }

        errors
    }
}

/// Proxy key material
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct KeyConfig {
    /// PKCS#8 PEM private key; a keypair is generated when unset
    pub private_key_path: Option<PathBuf>,
    /// Modulus size of a generated keypair
    pub key_bits: usize,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            private_key_path: None,
            key_bits: 1024,
        }
    }
}

impl KeyConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        match &self.private_key_path {
            Some(path) if !path.exists() => {
                errors.push(format!("Private key file does not exist: {}", path.display()));
            }
            Some(_) => {}
            None => {
                if self.key_bits < 512 || self.key_bits > 4096 {
                    errors.push(format!(
                        "Invalid key size: {} bits (valid range: 512-4096)",
                        self.key_bits
                    ));
                }
            }
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,
    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,
    /// Whether to log to console
    pub log_to_console: bool,
    /// Whether to log to file
    pub log_to_file: bool,
    /// Path to log file (if log_to_file is true)
    pub log_file_path: Option<String>,
    /// Hex dump forwarded packets at trace level
    pub hex_dumps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("proto-proxy"),
            log_level: Level::INFO,
            log_to_console: true,
            log_to_file: false,
            log_file_path: None,
            hex_dumps: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        if self.log_to_file {
            if let Some(ref path) = self.log_file_path {
                if let Some(parent) = Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        errors.push(format!(
                            "Log file directory does not exist: {}",
                            parent.display()
                        ));
                    }
                }
            } else {
                errors.push("log_file_path must be specified when log_to_file is true".to_string());
            }
        }

        if !self.log_to_console && !self.log_to_file {
            errors
                .push("At least one logging output (console or file) must be enabled".to_string());
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&level.as_str().to_ascii_lowercase())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Level::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ProxyConfig::default();
        assert!(config.validate().is_empty(), "{:?}", config.validate());
        assert_eq!(config.upstream_address(), "127.0.0.1:25565");
        assert_eq!(config.relay.queue_capacity, 1024 * 1024);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ProxyConfig::from_toml(
            r#"
            [upstream]
            port = 25000

            [logging]
            log_level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.upstream.port, 25000);
        assert_eq!(config.upstream.host, "127.0.0.1");
        assert_eq!(config.logging.log_level, Level::DEBUG);
        assert_eq!(config.listen.address, "0.0.0.0:25564");
    }

    #[test]
    fn test_example_config_parses_back() {
        let example = ProxyConfig::example_config();
        let parsed = ProxyConfig::from_toml(&example).unwrap();
        assert_eq!(parsed.listen.address, ProxyConfig::default().listen.address);
        assert_eq!(parsed.logging.log_level, Level::INFO);
    }
}
