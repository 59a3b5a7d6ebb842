//! # Connection Session
//!
//! One session per accepted client. It connects to the real server, then
//! relays between the two sockets until either peer closes or a fatal error
//! occurs. Both sockets are always torn down together.
//!
//! ```text
//! Connecting --(upstream connected)--> Relaying --(EOF / error)--> Closed
//!      \--(connect failed)-----------------------------------------^
//! ```

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, error, info, info_span, Instrument};

use crate::config::ProxyConfig;
use crate::error::{ProxyError, Result};
use crate::protocol::relay::{Relay, RelaySettings};
use crate::service::keys::ProxyKeys;
use crate::utils::metrics::Metrics;
use crate::Side;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Relaying,
    Closed,
}

pub struct Session {
    id: u64,
    peer: SocketAddr,
    config: Arc<ProxyConfig>,
    keys: Arc<ProxyKeys>,
    metrics: Arc<Metrics>,
    state: SessionState,
}

impl Session {
    pub fn new(
        peer: SocketAddr,
        config: Arc<ProxyConfig>,
        keys: Arc<ProxyKeys>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            peer,
            config,
            keys,
            metrics,
            state: SessionState::Connecting,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Connect upstream and relay until the session ends.
    ///
    /// Errors are logged here before being returned.
    pub async fn run(&mut self, client: TcpStream) -> Result<()> {
        let span = info_span!("session", id = self.id, peer = %self.peer);
        async move {
            info!("Client connected");
            let result = self.connect_and_relay(client).await;
            self.state = SessionState::Closed;
            match &result {
                Ok(()) => info!("Session closed"),
                Err(e) => error!(error = %e, "Session terminated"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn connect_and_relay(&mut self, client: TcpStream) -> Result<()> {
        let address = self.config.upstream_address();
        debug!(%address, "Connecting upstream");
        let server = match TcpStream::connect(&address).await {
            Ok(server) => server,
            Err(source) => {
                self.metrics.connect_failed();
                return Err(ProxyError::ConnectFailed { address, source });
            }
        };

        self.state = SessionState::Relaying;
        info!(%address, "Relaying");
        let engine = Relay::new(
            Arc::clone(&self.keys),
            RelaySettings::from(self.config.as_ref()),
            Arc::clone(&self.metrics),
        );
        let closed_by = relay(client, server, engine, self.config.relay.read_chunk_size).await?;
        info!(side = %closed_by, "Peer closed the connection");
        Ok(())
    }
}

/// Relay between two byte streams until one of them reaches EOF.
///
/// Returns the side that closed. Both streams are shut down on return, and
/// dropped on error.
pub async fn relay<C, S>(client: C, server: S, mut engine: Relay, chunk_size: usize) -> Result<Side>
where
    C: AsyncRead + AsyncWrite,
    S: AsyncRead + AsyncWrite,
{
    let (mut client_rx, mut client_tx) = tokio::io::split(client);
    let (mut server_rx, mut server_tx) = tokio::io::split(server);
    let mut client_buf = vec![0u8; chunk_size];
    let mut server_buf = vec![0u8; chunk_size];

    let closed_by = loop {
        let (from, read) = tokio::select! {
            read = client_rx.read(&mut client_buf) => (Side::Client, read),
            read = server_rx.read(&mut server_buf) => (Side::Server, read),
        };
        let n = read?;
        if n == 0 {
            break from;
        }
        let chunk = match from {
            Side::Client => &mut client_buf[..n],
            Side::Server => &mut server_buf[..n],
        };
        engine.handle_inbound(from, chunk)?;

        if let Some(bytes) = engine.take_outbound(Side::Server) {
            server_tx.write_all(&bytes).await?;
        }
        if let Some(bytes) = engine.take_outbound(Side::Client) {
            client_tx.write_all(&bytes).await?;
        }
    };

    let _ = client_tx.shutdown().await;
    let _ = server_tx.shutdown().await;
    Ok(closed_by)
}
