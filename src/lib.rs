//! # Proto Proxy
//!
//! An interactive, transparent man-in-the-middle proxy for a stateful,
//! id-framed binary game protocol.
//!
//! Every packet the proxy recognizes is decoded, logged and relayed to the
//! opposite peer. When the peers negotiate encryption, the proxy performs a
//! split key exchange: it completes one RSA/AES handshake with the server and
//! an independent one with the client, so it can keep decoding traffic after
//! the switch to AES-128/CFB-8. Once traffic can no longer be interpreted,
//! that direction degrades to blind relay.
//!
//! ## Layers
//! - [`core`]: byte queue with transactional reads, codec primitives, packet records
//! - [`protocol`]: dispatch tables, key exchange, encryption state, relay engine
//! - [`service`]: per-connection sessions, listener and key material
//! - [`utils`]: cipher contexts, hex dumps, logging setup, metrics
//!
//! ## Example
//! ```rust,no_run
//! use proto_proxy::config::ProxyConfig;
//! use proto_proxy::service::{keys::ProxyKeys, server};
//! use std::sync::Arc;
//!
//! # async fn run() -> proto_proxy::error::Result<()> {
//! let config = Arc::new(ProxyConfig::default());
//! let keys = Arc::new(ProxyKeys::load_or_generate(&config.keys)?);
//! server::start(config, keys).await
//! # }
//! ```

use std::fmt;

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod utils;

/// One half of a proxied connection.
///
/// Identifies both where inbound bytes came from and where outbound bytes go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// The game client that connected to the proxy
    Client,
    /// The real game server the proxy connected to
    Server,
}

impl Side {
    /// The side traffic from this side is relayed to
    pub fn opposite(self) -> Self {
        match self {
            Side::Client => Side::Server,
            Side::Server => Side::Client,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Client => f.write_str("client"),
            Side::Server => f.write_str("server"),
        }
    }
}
