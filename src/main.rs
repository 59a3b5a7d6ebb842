use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::error;

use proto_proxy::config::ProxyConfig;
use proto_proxy::error::{ProxyError, Result};
use proto_proxy::service::{keys::ProxyKeys, server};
use proto_proxy::utils::logging;

/// Transparent logging proxy for the game protocol
#[derive(Debug, Parser)]
#[command(name = "proto-proxy", version, about)]
struct Cli {
    /// TOML configuration file; PROTO_PROXY_* variables are used when absent
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to accept clients on
    #[arg(short, long)]
    listen: Option<String>,

    /// Port of the real server on the upstream host
    #[arg(short = 'p', long)]
    upstream_port: Option<u16>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Proxy stopped");
            eprintln!("proto-proxy: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => ProxyConfig::from_file(path)?,
        None => ProxyConfig::from_env()?,
    };
    if let Some(listen) = cli.listen {
        config.listen.address = listen;
    }
    if let Some(port) = cli.upstream_port {
        config.upstream.port = port;
    }

    if cli.print_config {
        let rendered = toml::to_string_pretty(&config)
            .map_err(|e| ProxyError::ConfigError(format!("Failed to serialize config: {e}")))?;
        println!("{rendered}");
        return Ok(());
    }

    config.validate_strict()?;
    logging::init(&config.logging)?;

    let keys = ProxyKeys::load_or_generate(&config.keys)?;
    server::start(Arc::new(config), Arc::new(keys)).await
}
