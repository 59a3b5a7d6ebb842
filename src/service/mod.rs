//! # Service Layer
//!
//! The parts of the proxy that touch sockets and process-wide resources.
//!
//! ## Components
//! - **Session**: one client connection and its upstream connection
//! - **Server**: accept loop with graceful shutdown
//! - **Keys**: the proxy's RSA keypair

pub mod keys;
pub mod server;
pub mod session;
