//! Listener for incoming clients.
//!
//! Each accepted client gets its own task running a [`Session`]. Sessions share
//! nothing mutable: only the configuration, the proxy keypair and the metrics
//! counters, all behind `Arc`.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use crate::config::ProxyConfig;
use crate::error::Result;
use crate::service::keys::ProxyKeys;
use crate::service::session::Session;
use crate::utils::metrics::Metrics;

/// Bind the configured address and serve until Ctrl-C
#[instrument(skip_all, fields(address = %config.listen.address))]
pub async fn start(config: Arc<ProxyConfig>, keys: Arc<ProxyKeys>) -> Result<()> {
    // Create internal shutdown channel
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            info!("Received CTRL+C signal, shutting down");
            let _ = shutdown_tx.send(()).await;
        }
    });

    let listener = TcpListener::bind(&config.listen.address).await?;
    serve(listener, config, keys, Arc::new(Metrics::new()), shutdown_rx).await
}

/// Accept clients on `listener` until `shutdown_rx` fires
pub async fn serve(
    listener: TcpListener,
    config: Arc<ProxyConfig>,
    keys: Arc<ProxyKeys>,
    metrics: Arc<Metrics>,
    mut shutdown_rx: mpsc::Receiver<()>,
) -> Result<()> {
    info!(
        address = %listener.local_addr()?,
        upstream = %config.upstream_address(),
        "Proxy listening"
    );

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("Shutting down proxy. Waiting for sessions to close...");
                wait_for_sessions(&metrics, config.listen.shutdown_timeout).await;
                metrics.log_metrics();
                return Ok(());
            }

            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer)) => {
                        let mut session = Session::new(
                            peer,
                            Arc::clone(&config),
                            Arc::clone(&keys),
                            Arc::clone(&metrics),
                        );
                        let metrics = Arc::clone(&metrics);
                        metrics.session_opened();
                        debug!(session = session.id(), %peer, "Accepted client");

                        tokio::spawn(async move {
                            // The session logs its own failure
                            let _ = session.run(stream).await;
                            metrics.session_closed();
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "Error accepting connection");
                    }
                }
            }
        }
    }
}

async fn wait_for_sessions(metrics: &Metrics, timeout: Duration) {
    let timeout = tokio::time::sleep(timeout);
    tokio::pin!(timeout);

    loop {
        let active = metrics.sessions_active.load(Ordering::Relaxed);
        if active == 0 {
            info!("All sessions closed");
            return;
        }
        tokio::select! {
            _ = &mut timeout => {
                warn!(sessions = active, "Shutdown timeout reached, forcing exit");
                return;
            }
            _ = tokio::time::sleep(Duration::from_millis(500)) => {
                info!(sessions = active, "Waiting for sessions to close");
            }
        }
    }
}
