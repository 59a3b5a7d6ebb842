//! Log sink setup.
//!
//! Installs a `tracing` subscriber writing to the console, a file, or both.
//! Timestamps are seconds since startup. The file writer sits behind a mutex so
//! concurrent sessions never interleave within a line.
//!
//! `RUST_LOG` takes precedence over the configured level when set.

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::fmt::{self, time::Uptime};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::{ProxyError, Result};

/// Install the global subscriber.
///
/// # Errors
/// Returns `ProxyError::Io` if the log file cannot be opened and
/// `ProxyError::ConfigError` if a subscriber is already installed.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str().to_ascii_lowercase()));

    let console = config
        .log_to_console
        .then(|| fmt::layer().with_timer(Uptime::default()).with_target(false));

    let file = match (&config.log_file_path, config.log_to_file) {
        (Some(path), true) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_timer(Uptime::default())
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        _ => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| ProxyError::ConfigError(format!("Failed to install logger: {e}")))?;

    tracing::debug!(app = %config.app_name, "Logging initialized");
    Ok(())
}
