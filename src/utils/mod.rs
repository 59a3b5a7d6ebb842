//! # Utility Modules
//!
//! Supporting utilities for cryptography, logging, and observability.
//!
//! ## Components
//! - **Crypto**: AES-128/CFB-8 cipher contexts
//! - **Hexdump**: hex rendering of raw packet bytes
//! - **Logging**: tracing subscriber setup
//! - **Metrics**: Thread-safe observability counters

pub mod crypto;
pub mod hexdump;
pub mod logging;
pub mod metrics;
