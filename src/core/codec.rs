//! # Codec Primitives
//!
//! Results for speculative decoding and helpers for building outbound packets.
//!
//! A structural decode either yields a fully-populated record or stops with a
//! [`DecodeError`]. Queue reads return the zero-sized [`Insufficient`] marker,
//! which converts into [`DecodeError::Insufficient`] so decoders can chain
//! field reads with `?` and let the caller roll the queue back.

use std::fmt;

use bytes::{BufMut, BytesMut};
use thiserror::Error;

use crate::error::constants;

/// A read ran past the buffered data. Not a failure: more bytes are needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("insufficient data buffered")]
pub struct Insufficient;

/// Why a structural decode stopped before producing a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The packet is only partially buffered; retry after the next read.
    #[error("insufficient data buffered")]
    Insufficient,

    /// The buffered bytes can never form a valid packet.
    #[error("malformed structure: {0}")]
    Malformed(&'static str),
}

impl From<Insufficient> for DecodeError {
    fn from(_: Insufficient) -> Self {
        DecodeError::Insufficient
    }
}

/// Result of a structural decode
pub type DecodeResult<T> = std::result::Result<T, DecodeError>;

/// Convert a signed length prefix into a byte or unit count.
#[inline]
pub fn length_prefix(len: i32) -> DecodeResult<usize> {
    usize::try_from(len).map_err(|_| DecodeError::Malformed(constants::ERR_NEGATIVE_LENGTH))
}

/// A wire string kept as the UTF-16 code units it arrived as.
///
/// Displays lossily, but re-encodes to the exact original units, including
/// unpaired surrogates.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct String16(Vec<u16>);

impl String16 {
    pub fn from_units(units: Vec<u16>) -> Self {
        Self(units)
    }

    pub fn units(&self) -> &[u16] {
        &self.0
    }
}

impl From<&str> for String16 {
    fn from(value: &str) -> Self {
        Self(value.encode_utf16().collect())
    }
}

impl PartialEq<&str> for String16 {
    fn eq(&self, other: &&str) -> bool {
        self.0.iter().copied().eq(other.encode_utf16())
    }
}

impl fmt::Display for String16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf16_lossy(&self.0))
    }
}

impl fmt::Debug for String16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&String::from_utf16_lossy(&self.0), f)
    }
}

/// Builder for outbound packets.
///
/// Mirrors the queue's read operations: big-endian scalars, UTF-16 strings with
/// a 16-bit unit count and 16-bit length-prefixed blobs.
#[derive(Debug, Default)]
pub struct PacketWriter {
    buf: BytesMut,
}

impl PacketWriter {
    /// Start a packet with its identifier byte
    pub fn new(id: u8) -> Self {
        let mut buf = BytesMut::with_capacity(64);
        buf.put_u8(id);
        Self { buf }
    }

    pub fn u8(mut self, value: u8) -> Self {
        self.buf.put_u8(value);
        self
    }

    pub fn i16(mut self, value: i16) -> Self {
        self.buf.put_i16(value);
        self
    }

    pub fn i32(mut self, value: i32) -> Self {
        self.buf.put_i32(value);
        self
    }

    /// Write a string as a unit count followed by UTF-16BE code units
    pub fn string16(self, value: &str) -> Self {
        let units: Vec<u16> = value.encode_utf16().collect();
        self.utf16(&units)
    }

    /// Write raw UTF-16 code units with their count
    pub fn utf16(mut self, units: &[u16]) -> Self {
        self.buf.put_i16(units.len() as i16);
        for &unit in units {
            self.buf.put_u16(unit);
        }
        self
    }

    /// Write a byte blob prefixed with its 16-bit length
    pub fn blob16(mut self, value: &[u8]) -> Self {
        self.buf.put_i16(value.len() as i16);
        self.buf.put_slice(value);
        self
    }

    /// Finish the packet
    pub fn finish(self) -> BytesMut {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_string16_layout() {
        let bytes = PacketWriter::new(0xff).string16("Hi").finish();
        assert_eq!(&bytes[..], &[0xff, 0x00, 0x02, 0x00, b'H', 0x00, b'i']);
    }

    #[test]
    fn test_writer_blob16_layout() {
        let bytes = PacketWriter::new(0xfc).blob16(&[9, 8, 7]).blob16(&[]).finish();
        assert_eq!(&bytes[..], &[0xfc, 0x00, 0x03, 9, 8, 7, 0x00, 0x00]);
    }

    #[test]
    fn test_lone_surrogate_survives_reencoding() {
        let name = String16::from_units(vec![0x0061, 0xd800, 0x0062]);
        assert_eq!(name.to_string(), "a\u{fffd}b");
        let bytes = PacketWriter::new(0x02).utf16(name.units()).finish();
        assert_eq!(&bytes[..], &[0x02, 0x00, 0x03, 0x00, 0x61, 0xd8, 0x00, 0x00, 0x62]);
        assert_eq!(String16::from("steve"), "steve");
    }

    #[test]
    fn test_negative_length_is_malformed() {
        assert_eq!(length_prefix(12), Ok(12));
        assert!(matches!(length_prefix(-1), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn test_insufficient_converts() {
        let err: DecodeError = Insufficient.into();
        assert_eq!(err, DecodeError::Insufficient);
    }
}
