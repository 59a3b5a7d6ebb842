//! # Framed Byte Queue
//!
//! Bounded byte buffer with a transactional read cursor, one per direction.
//!
//! The queue tracks three positions:
//!
//! ```text
//!   committed-read      current-read              write
//!        |==== consumed ====|------ unread ------|
//! ```
//!
//! Scalar reads advance *current-read* only when the whole value is buffered;
//! a short read leaves every position untouched and reports [`Insufficient`].
//! [`ByteQueue::reset`] rolls *current-read* back to *committed-read* and
//! [`ByteQueue::commit`] discards everything before *current-read*.
//!
//! Capacity counts the uncommitted bytes (committed-read to write). A write that
//! would exceed it fails instead of growing the buffer; that is the only
//! backpressure the proxy applies.
//!
//! ## Usage
//! ```rust
//! use proto_proxy::core::queue::ByteQueue;
//!
//! let mut queue = ByteQueue::new(16);
//! queue.write(&[0x00, 0x2a]).unwrap();
//! assert!(queue.read_i32().is_err()); // only two bytes buffered
//! assert_eq!(queue.read_i16().unwrap(), 42);
//! queue.commit();
//! assert_eq!(queue.uncommitted(), 0);
//! ```

use bytes::{Buf, BytesMut};

use crate::core::codec::{length_prefix, DecodeResult, Insufficient, String16};
use crate::error::{ProxyError, Result};

/// Default capacity per direction (1 MiB)
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024 * 1024;

/// Initial allocation; the buffer grows on demand up to the capacity.
const INITIAL_ALLOCATION: usize = 64 * 1024;

macro_rules! scalar_readers {
    ($($(#[$doc:meta])* $be:ident, $le:ident => $ty:ty;)*) => {
        $(
            $(#[$doc])*
            pub fn $be(&mut self) -> std::result::Result<$ty, Insufficient> {
                self.take().map(<$ty>::from_be_bytes)
            }

            $(#[$doc])*
            /// Little-endian variant.
            pub fn $le(&mut self) -> std::result::Result<$ty, Insufficient> {
                self.take().map(<$ty>::from_le_bytes)
            }
        )*
    };
}

/// Per-direction byte queue with committed and current read positions.
#[derive(Debug)]
pub struct ByteQueue {
    /// Bytes from committed-read up to write
    data: BytesMut,
    /// Current-read, as an offset from committed-read
    read_pos: usize,
    capacity: usize,
}

impl ByteQueue {
    /// Create a queue holding at most `capacity` uncommitted bytes
    pub fn new(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity.min(INITIAL_ALLOCATION)),
            read_pos: 0,
            capacity,
        }
    }

    /// Append bytes at the write position.
    ///
    /// # Errors
    /// Returns `ProxyError::QueueFull` if the uncommitted data would exceed the
    /// capacity. Nothing is written in that case.
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let requested = self.data.len() + bytes.len();
        if requested > self.capacity {
            return Err(ProxyError::QueueFull {
                capacity: self.capacity,
                requested,
            });
        }
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    /// Bytes between committed-read and write
    pub fn uncommitted(&self) -> usize {
        self.data.len()
    }

    /// Bytes between current-read and write
    pub fn readable(&self) -> usize {
        self.data.len() - self.read_pos
    }

    pub fn can_read(&self, count: usize) -> bool {
        self.readable() >= count
    }

    /// Move committed-read up to current-read, freeing the consumed bytes
    pub fn commit(&mut self) {
        self.data.advance(self.read_pos);
        self.read_pos = 0;
    }

    /// Roll current-read back to committed-read
    pub fn reset(&mut self) {
        self.read_pos = 0;
    }

    fn take<const N: usize>(&mut self) -> std::result::Result<[u8; N], Insufficient> {
        if !self.can_read(N) {
            return Err(Insufficient);
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[self.read_pos..self.read_pos + N]);
        self.read_pos += N;
        Ok(out)
    }

    pub fn read_u8(&mut self) -> std::result::Result<u8, Insufficient> {
        self.take::<1>().map(|[b]| b)
    }

    pub fn read_i8(&mut self) -> std::result::Result<i8, Insufficient> {
        self.take::<1>().map(|[b]| b as i8)
    }

    /// A single byte, non-zero meaning `true`
    pub fn read_bool(&mut self) -> std::result::Result<bool, Insufficient> {
        self.read_u8().map(|b| b != 0)
    }

    scalar_readers! {
        read_u16, read_u16_le => u16;
        read_i16, read_i16_le => i16;
        read_u32, read_u32_le => u32;
        read_i32, read_i32_le => i32;
        read_i64, read_i64_le => i64;
        read_f32, read_f32_le => f32;
        read_f64, read_f64_le => f64;
    }

    /// Read a string stored as a 16-bit unit count followed by UTF-16BE units.
    ///
    /// Unpaired surrogates are replaced; use [`ByteQueue::read_utf16`] where
    /// the string is written back out.
    pub fn read_string16(&mut self) -> DecodeResult<String> {
        self.read_utf16().map(|units| units.to_string())
    }

    /// Read a UTF-16 string keeping its code units as they were sent
    pub fn read_utf16(&mut self) -> DecodeResult<String16> {
        let start = self.read_pos;
        let result = self.read_utf16_inner();
        if result.is_err() {
            self.read_pos = start;
        }
        result
    }

    fn read_utf16_inner(&mut self) -> DecodeResult<String16> {
        let units = length_prefix(i32::from(self.read_i16()?))?;
        if !self.can_read(units * 2) {
            return Err(Insufficient.into());
        }
        let mut raw = Vec::with_capacity(units);
        for _ in 0..units {
            raw.push(self.read_u16()?);
        }
        Ok(String16::from_units(raw))
    }

    /// Read a run of exactly `count` bytes
    pub fn read_bytes(&mut self, count: usize) -> std::result::Result<Vec<u8>, Insufficient> {
        if !self.can_read(count) {
            return Err(Insufficient);
        }
        let out = self.data[self.read_pos..self.read_pos + count].to_vec();
        self.read_pos += count;
        Ok(out)
    }

    /// Advance current-read over `count` bytes without copying them
    pub fn skip(&mut self, count: usize) -> std::result::Result<(), Insufficient> {
        if !self.can_read(count) {
            return Err(Insufficient);
        }
        self.read_pos += count;
        Ok(())
    }

    /// The bytes consumed since the last commit (committed-read to current-read)
    pub fn read_again(&self) -> &[u8] {
        &self.data[..self.read_pos]
    }

    /// Read everything from current-read to write
    pub fn read_remainder(&mut self) -> Vec<u8> {
        let out = self.data[self.read_pos..].to_vec();
        self.read_pos = self.data.len();
        out
    }

    /// Hand off every uncommitted byte verbatim, leaving the queue empty
    pub fn take_uncommitted(&mut self) -> BytesMut {
        self.read_pos = 0;
        self.data.split()
    }

    /// Mutable view of the unread bytes, for in-place transformation
    pub fn unread_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.read_pos..]
    }
}

impl Default for ByteQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}
