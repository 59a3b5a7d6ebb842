//! Item slot sub-structure.
//!
//! ```text
//! [Type(i16)]                                   type <= 0: empty slot
//! [Type(i16)] [Count(i8)] [Damage(i16)] [MetaLen(i16)] [Meta(MetaLen)]
//! ```
//!
//! The metadata blob is skipped, not interpreted.

use std::fmt;

use crate::core::codec::DecodeResult;
use crate::core::queue::ByteQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemSlot {
    Empty,
    Item {
        item_type: i16,
        count: i8,
        damage: i16,
        metadata_len: usize,
    },
}

impl ItemSlot {
    /// Decode one slot as part of an enclosing packet; a partial slot makes the
    /// whole packet insufficient.
    pub fn decode(queue: &mut ByteQueue) -> DecodeResult<Self> {
        let item_type = queue.read_i16()?;
        if item_type <= 0 {
            return Ok(ItemSlot::Empty);
        }
        let count = queue.read_i8()?;
        let damage = queue.read_i16()?;
        // A non-positive length means no metadata follows
        let metadata_len = usize::try_from(queue.read_i16()?).unwrap_or(0);
        queue.skip(metadata_len)?;
        Ok(ItemSlot::Item {
            item_type,
            count,
            damage,
            metadata_len,
        })
    }
}

impl fmt::Display for ItemSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemSlot::Empty => f.write_str("<empty>"),
            ItemSlot::Item {
                item_type,
                count,
                damage,
                metadata_len,
            } => {
                write!(f, "{item_type}:{damage} * {count}")?;
                if *metadata_len > 0 {
                    write!(f, " ({metadata_len} bytes of meta)")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::DecodeError;

    #[test]
    fn test_empty_slot_consumes_two_bytes() {
        let mut queue = ByteQueue::new(64);
        queue.write(&[0xff, 0xff, 0x01, 0x02, 0x03]).unwrap();
        assert_eq!(ItemSlot::decode(&mut queue), Ok(ItemSlot::Empty));
        assert_eq!(queue.read_again().len(), 2);

        let mut queue = ByteQueue::new(64);
        queue.write(&[0x00, 0x00]).unwrap();
        assert_eq!(ItemSlot::decode(&mut queue), Ok(ItemSlot::Empty));
        assert_eq!(queue.readable(), 0);
    }

    #[test]
    fn test_item_with_metadata() {
        let mut queue = ByteQueue::new(64);
        queue
            .write(&[0x01, 0x14, 0x05, 0x00, 0x03, 0x00, 0x02, 0xaa, 0xbb, 0x7f])
            .unwrap();
        let slot = ItemSlot::decode(&mut queue).unwrap();
        assert_eq!(
            slot,
            ItemSlot::Item {
                item_type: 276,
                count: 5,
                damage: 3,
                metadata_len: 2
            }
        );
        assert_eq!(slot.to_string(), "276:3 * 5 (2 bytes of meta)");
        assert_eq!(queue.read_u8(), Ok(0x7f));
    }

    #[test]
    fn test_negative_metadata_length_means_none() {
        let mut queue = ByteQueue::new(64);
        queue.write(&[0x00, 0x01, 0x01, 0x00, 0x00, 0xff, 0xff]).unwrap();
        let slot = ItemSlot::decode(&mut queue).unwrap();
        assert_eq!(slot.to_string(), "1:0 * 1");
        assert_eq!(queue.readable(), 0);
    }

    #[test]
    fn test_truncated_metadata_is_insufficient() {
        let mut queue = ByteQueue::new(64);
        queue.write(&[0x00, 0x01, 0x01, 0x00, 0x00, 0x00, 0x04, 0xaa]).unwrap();
        assert_eq!(ItemSlot::decode(&mut queue), Err(DecodeError::Insufficient));
    }
}
