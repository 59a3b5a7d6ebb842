//! # Core Protocol Components
//!
//! Low-level byte handling for the proxied wire format.
//!
//! The protocol has no universal length prefix: a packet is a one-byte
//! identifier followed by a type-specific, densely packed big-endian field
//! sequence. Decoding therefore has to be speculative, reading field by field
//! and rolling back when a packet is only partially buffered.
//!
//! ## Components
//! - **Queue**: bounded byte buffer with committed/current read cursors
//! - **Codec**: decode results, UTF-16 strings, outbound packet writer
//! - **Packet**: packet identifiers and typed packet records
//! - **Slot**: the item-slot sub-structure shared by several packets
//!
//! ## Wire Format
//! ```text
//! [Id(1)] [Field...]            fields are big-endian
//! string: [Len(2)] [UTF-16BE code units (2 * Len)]
//! blob:   [Len(2|4)] [Bytes(Len)]
//! ```

pub mod codec;
pub mod packet;
pub mod queue;
pub mod slot;
