//! # Error Types
//!
//! Error handling for the proxy core.
//!
//! Every variant here is fatal to the [`Session`](crate::service::session::Session)
//! that produced it: the relay loop stops, both endpoints are closed and the
//! error is logged. Nothing is surfaced to the peers beyond the closed stream.
//!
//! ## Error Categories
//! - **Transport**: upstream connect failures, socket I/O errors
//! - **Capacity**: a direction's byte queue would exceed its bound
//! - **Protocol**: unknown packet id while unencrypted, malformed structures
//! - **Cryptographic**: RSA key decoding and encryption failures
//! - **Configuration**: invalid or unreadable configuration
//!
//! Running out of buffered bytes in the middle of a packet is *not* an error;
//! see [`Insufficient`](crate::core::codec::Insufficient).
//!
//! ## Example Usage
//! ```rust
//! use proto_proxy::error::{ProxyError, Result};
//! use tracing::error;
//!
//! fn check(capacity: usize, requested: usize) -> Result<()> {
//!     if requested > capacity {
//!         return Err(ProxyError::QueueFull { capacity, requested });
//!     }
//!     Ok(())
//! }
//!
//! if let Err(e) = check(4, 8) {
//!     error!(error = %e, "queue check failed");
//! }
//! ```

use std::io;
use thiserror::Error;

use crate::protocol::state::EncryptionState;
use crate::Side;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Handshake errors
    pub const ERR_NO_PENDING_NONCE: &str = "No key request was sent to the client";
    pub const ERR_NONCE_LENGTH: &str = "Decrypted nonce is not 4 bytes long";
    pub const ERR_NONCE_MISMATCH: &str = "Decrypted nonce does not match the pending nonce";
    pub const ERR_SECRET_LENGTH: &str = "Decrypted shared secret is not 16 bytes long";
    pub const ERR_BLOB_TOO_LONG: &str = "Encrypted handshake parameter too long";
    pub const ERR_NONZERO_ACK: &str = "Key response acknowledgement carries non-empty fields";
    pub const ERR_UNEXPECTED_ACK: &str = "Key response acknowledgement before any key response";
    pub const ERR_UNEXPECTED_KEY_REQUEST: &str = "Key request after encryption was negotiated";

    /// Codec errors
    pub const ERR_NEGATIVE_LENGTH: &str = "Negative length prefix";
}

/// Primary error type for all proxy operations.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Cannot connect to upstream server {address}: {source}")]
    ConnectFailed {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("Queued data would exceed capacity: {requested} bytes requested, {capacity} bytes capacity")]
    QueueFull { capacity: usize, requested: usize },

    #[error("Unknown packet 0x{id:02x} from the {side} while unencrypted")]
    UnknownPacket { side: Side, id: u8 },

    #[error("Malformed packet 0x{id:02x} from the {side}: {reason}")]
    MalformedPacket {
        side: Side,
        id: u8,
        reason: &'static str,
    },

    #[error("Handshake failed: {0}")]
    HandshakeError(&'static str),

    #[error("RSA error: {0}")]
    Rsa(#[from] rsa::Error),

    #[error("Key encoding error: {0}")]
    KeyEncoding(String),

    #[error("Invalid encryption state transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: EncryptionState,
        to: EncryptionState,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Type alias for Results using ProxyError
pub type Result<T> = std::result::Result<T, ProxyError>;
