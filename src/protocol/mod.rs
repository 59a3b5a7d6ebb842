//! # Protocol Layer
//!
//! Everything the proxy does with decoded traffic, independent of sockets.
//!
//! ## Components
//! - **Dispatcher**: per-direction packet id to decoder tables
//! - **Handshake**: the split RSA key exchange
//! - **State**: per-direction encryption state machine
//! - **Relay**: the engine tying queues, ciphers and dispatch together

pub mod dispatcher;
pub mod handshake;
pub mod relay;
pub mod state;
