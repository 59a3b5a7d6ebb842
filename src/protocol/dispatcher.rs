//! Per-direction dispatch tables.
//!
//! Each direction maps a one-byte packet identifier to a decoder that reads the
//! packet's fields from that direction's [`ByteQueue`]. Decoders are plain
//! functions, so the tables are static `match` expressions.
//!
//! [`next_packet`] drives one step of the dispatch loop: it reads the
//! identifier, runs the decoder and, if the packet is only partially buffered,
//! rolls the queue back to before the identifier so the next network read
//! retries the same packet from its header.

use crate::core::codec::{length_prefix, DecodeError, DecodeResult};
use crate::core::packet::{
    ClientPacket, Handshake, KeyRequest, KeyResponse, PacketId, PositionLook, ServerPacket,
    SignUpdate,
};
use crate::core::queue::ByteQueue;
use crate::core::slot::ItemSlot;
use crate::error::{ProxyError, Result};
use crate::Side;

/// Decodes one packet body; the identifier byte has already been consumed
pub type Decoder<P> = fn(&mut ByteQueue) -> DecodeResult<P>;

/// A direction's packet set and its identifier lookup
pub trait PacketTable: Sized + std::fmt::Debug {
    /// The side that sends these packets
    const SIDE: Side;

    fn decoder(id: u8) -> Option<Decoder<Self>>;
}

/// Outcome of one dispatch step
#[derive(Debug, PartialEq)]
pub enum Dispatch<P> {
    /// A complete packet; the queue's current-read sits right after it
    Packet(PacketId, P),
    /// The packet is partially buffered; the queue was rolled back
    Incomplete,
    /// No decoder for this identifier; the identifier byte has been consumed
    Unknown(u8),
    /// Nothing buffered
    Empty,
}

/// Read the next packet from `queue`.
///
/// # Errors
/// Returns `ProxyError::MalformedPacket` when the buffered bytes can never
/// form a valid packet.
pub fn next_packet<P: PacketTable>(queue: &mut ByteQueue) -> Result<Dispatch<P>> {
    let Ok(id) = queue.read_u8() else {
        return Ok(Dispatch::Empty);
    };
    let (Some(packet_id), Some(decoder)) = (PacketId::from_byte(id), P::decoder(id)) else {
        return Ok(Dispatch::Unknown(id));
    };
    match decoder(queue) {
        Ok(packet) => Ok(Dispatch::Packet(packet_id, packet)),
        Err(DecodeError::Insufficient) => {
            queue.reset();
            Ok(Dispatch::Incomplete)
        }
        Err(DecodeError::Malformed(reason)) => Err(ProxyError::MalformedPacket {
            side: P::SIDE,
            id,
            reason,
        }),
    }
}

fn read_sign(queue: &mut ByteQueue) -> DecodeResult<SignUpdate> {
    Ok(SignUpdate {
        x: queue.read_i32()?,
        y: queue.read_i16()?,
        z: queue.read_i32()?,
        lines: [
            queue.read_string16()?,
            queue.read_string16()?,
            queue.read_string16()?,
            queue.read_string16()?,
        ],
    })
}

fn read_position_look(queue: &mut ByteQueue) -> DecodeResult<PositionLook> {
    Ok(PositionLook {
        x: queue.read_f64()?,
        stance: queue.read_f64()?,
        y: queue.read_f64()?,
        z: queue.read_f64()?,
        yaw: queue.read_f32()?,
        pitch: queue.read_f32()?,
        on_ground: queue.read_bool()?,
    })
}

fn read_blob16(queue: &mut ByteQueue) -> DecodeResult<Vec<u8>> {
    let len = length_prefix(i32::from(queue.read_i16()?))?;
    Ok(queue.read_bytes(len)?)
}

fn read_key_response(queue: &mut ByteQueue) -> DecodeResult<KeyResponse> {
    Ok(KeyResponse {
        encrypted_secret: read_blob16(queue)?,
        encrypted_nonce: read_blob16(queue)?,
    })
}

/// Skip an opaque payload preceded by a 32-bit length
fn skip_blob32(queue: &mut ByteQueue) -> DecodeResult<usize> {
    let len = length_prefix(queue.read_i32()?)?;
    queue.skip(len)?;
    Ok(len)
}

impl PacketTable for ClientPacket {
    const SIDE: Side = Side::Client;

    fn decoder(id: u8) -> Option<Decoder<Self>> {
        let decoder: Decoder<Self> = match PacketId::from_byte(id)? {
            PacketId::KeepAlive => |q| {
                Ok(ClientPacket::KeepAlive {
                    id: q.read_i32()?,
                })
            },
            PacketId::Handshake => |q| {
                Ok(ClientPacket::Handshake(Handshake {
                    protocol_version: q.read_u8()?,
                    username: q.read_utf16()?,
                    server_host: q.read_utf16()?,
                    server_port: q.read_i32()?,
                }))
            },
            PacketId::ChatMessage => |q| {
                Ok(ClientPacket::ChatMessage {
                    message: q.read_string16()?,
                })
            },
            PacketId::PlayerOnGround => |q| {
                Ok(ClientPacket::PlayerOnGround {
                    on_ground: q.read_bool()?,
                })
            },
            PacketId::PlayerPosition => |q| {
                Ok(ClientPacket::PlayerPosition {
                    x: q.read_f64()?,
                    stance: q.read_f64()?,
                    y: q.read_f64()?,
                    z: q.read_f64()?,
                    on_ground: q.read_bool()?,
                })
            },
            PacketId::PlayerLook => |q| {
                Ok(ClientPacket::PlayerLook {
                    yaw: q.read_f32()?,
                    pitch: q.read_f32()?,
                    on_ground: q.read_bool()?,
                })
            },
            PacketId::PlayerPositionLook => {
                |q| Ok(ClientPacket::PlayerPositionLook(read_position_look(q)?))
            }
            PacketId::BlockPlace => |q| {
                Ok(ClientPacket::BlockPlace {
                    x: q.read_i32()?,
                    y: q.read_u8()?,
                    z: q.read_i32()?,
                    face: q.read_i8()?,
                    item: ItemSlot::decode(q)?,
                    cursor: [q.read_i8()?, q.read_i8()?, q.read_i8()?],
                })
            },
            PacketId::SlotSelect => |q| {
                Ok(ClientPacket::SlotSelect {
                    slot: q.read_i16()?,
                })
            },
            PacketId::Animation => |q| {
                Ok(ClientPacket::Animation {
                    entity_id: q.read_i32()?,
                    animation: q.read_i8()?,
                })
            },
            PacketId::UpdateSign => |q| Ok(ClientPacket::UpdateSign(read_sign(q)?)),
            PacketId::LocaleAndView => |q| {
                Ok(ClientPacket::LocaleAndView {
                    locale: q.read_string16()?,
                    view_distance: q.read_i8()?,
                    chat_flags: q.read_i8()?,
                    difficulty: q.read_i8()?,
                })
            },
            PacketId::ClientStatuses => |q| {
                Ok(ClientPacket::ClientStatuses {
                    statuses: q.read_i8()?,
                })
            },
            PacketId::EncryptionKeyResponse => {
                |q| Ok(ClientPacket::EncryptionKeyResponse(read_key_response(q)?))
            }
            PacketId::Ping => |_| Ok(ClientPacket::Ping),
            PacketId::Kick => |q| {
                Ok(ClientPacket::Disconnect {
                    reason: q.read_string16()?,
                })
            },
            _ => return None,
        };
        Some(decoder)
    }
}

impl PacketTable for ServerPacket {
    const SIDE: Side = Side::Server;

    fn decoder(id: u8) -> Option<Decoder<Self>> {
        let decoder: Decoder<Self> = match PacketId::from_byte(id)? {
            PacketId::KeepAlive => |q| {
                Ok(ServerPacket::KeepAlive {
                    id: q.read_i32()?,
                })
            },
            PacketId::Login => |q| {
                Ok(ServerPacket::Login {
                    entity_id: q.read_i32()?,
                    level_type: q.read_string16()?,
                    game_mode: q.read_i8()?,
                    dimension: q.read_i8()?,
                    difficulty: q.read_i8()?,
                    unused: q.read_i8()?,
                    max_players: q.read_i8()?,
                })
            },
            PacketId::ChatMessage => |q| {
                Ok(ServerPacket::ChatMessage {
                    message: q.read_string16()?,
                })
            },
            PacketId::TimeUpdate => |q| {
                Ok(ServerPacket::TimeUpdate {
                    time: q.read_i64()?,
                })
            },
            PacketId::EntityEquipment => |q| {
                Ok(ServerPacket::EntityEquipment {
                    entity_id: q.read_i32()?,
                    slot: q.read_i16()?,
                    item: ItemSlot::decode(q)?,
                })
            },
            PacketId::Compass => |q| {
                Ok(ServerPacket::Compass {
                    x: q.read_i32()?,
                    y: q.read_i32()?,
                    z: q.read_i32()?,
                })
            },
            PacketId::UpdateHealth => |q| {
                Ok(ServerPacket::UpdateHealth {
                    health: q.read_i16()?,
                    food: q.read_i16()?,
                    saturation: q.read_f32()?,
                })
            },
            PacketId::PlayerPositionLook => {
                |q| Ok(ServerPacket::PlayerPositionLook(read_position_look(q)?))
            }
            PacketId::MapChunk => |q| {
                Ok(ServerPacket::MapChunk {
                    x: q.read_i32()?,
                    z: q.read_i32()?,
                    contiguous: q.read_bool()?,
                    primary_bitmap: q.read_u16()?,
                    add_bitmap: q.read_u16()?,
                    compressed_len: skip_blob32(q)?,
                })
            },
            PacketId::MultiBlockChange => |q| {
                Ok(ServerPacket::MultiBlockChange {
                    x: q.read_i32()?,
                    z: q.read_i32()?,
                    block_count: q.read_i16()?,
                    data_len: skip_blob32(q)?,
                })
            },
            PacketId::BlockChange => |q| {
                Ok(ServerPacket::BlockChange {
                    x: q.read_i32()?,
                    y: q.read_u8()?,
                    z: q.read_i32()?,
                    block_type: q.read_i16()?,
                    block_meta: q.read_i8()?,
                })
            },
            PacketId::WindowContents => |q| {
                let window_id = q.read_i8()?;
                let count = usize::try_from(q.read_i16()?).unwrap_or(0);
                let mut slots = Vec::with_capacity(count);
                for _ in 0..count {
                    slots.push(ItemSlot::decode(q)?);
                }
                Ok(ServerPacket::WindowContents { window_id, slots })
            },
            PacketId::UpdateSign => |q| Ok(ServerPacket::UpdateSign(read_sign(q)?)),
            PacketId::PlayerListItem => |q| {
                Ok(ServerPacket::PlayerListItem {
                    name: q.read_string16()?,
                    online: q.read_bool()?,
                    ping: q.read_i16()?,
                })
            },
            PacketId::PlayerAbilities => |q| {
                Ok(ServerPacket::PlayerAbilities {
                    flags: q.read_i8()?,
                    flying_speed: q.read_i8()?,
                    walking_speed: q.read_i8()?,
                })
            },
            PacketId::EncryptionKeyRequest => |q| {
                Ok(ServerPacket::EncryptionKeyRequest(KeyRequest {
                    server_id: q.read_string16()?,
                    public_key: read_blob16(q)?,
                    nonce: read_blob16(q)?,
                }))
            },
            PacketId::EncryptionKeyResponse => {
                |q| Ok(ServerPacket::EncryptionKeyResponse(read_key_response(q)?))
            }
            PacketId::Kick => |q| {
                Ok(ServerPacket::Kick {
                    reason: q.read_string16()?,
                })
            },
            _ => return None,
        };
        Some(decoder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue_with(bytes: &[u8]) -> ByteQueue {
        let mut queue = ByteQueue::new(1024);
        queue.write(bytes).unwrap();
        queue
    }

    #[test]
    fn test_tables_are_direction_specific() {
        // Handshake only comes from the client, login only from the server
        assert!(ClientPacket::decoder(0x02).is_some());
        assert!(ServerPacket::decoder(0x02).is_none());
        assert!(ServerPacket::decoder(0x01).is_some());
        assert!(ClientPacket::decoder(0x01).is_none());
    }

    #[test]
    fn test_incomplete_rolls_back_before_id() {
        let mut queue = queue_with(&[0x12, 0x00, 0x00]);
        assert_eq!(
            next_packet::<ClientPacket>(&mut queue).unwrap(),
            Dispatch::Incomplete
        );
        assert_eq!(queue.readable(), 3);
        assert_eq!(queue.uncommitted(), 3);
    }

    #[test]
    fn test_complete_packet() {
        let mut queue = queue_with(&[0x12, 0x00, 0x00, 0x00, 0x07, 0x01, 0xaa]);
        assert_eq!(
            next_packet::<ClientPacket>(&mut queue).unwrap(),
            Dispatch::Packet(
                PacketId::Animation,
                ClientPacket::Animation {
                    entity_id: 7,
                    animation: 1
                }
            )
        );
        assert_eq!(queue.read_again().len(), 6);
        assert_eq!(queue.readable(), 1);
    }

    #[test]
    fn test_unknown_and_empty() {
        let mut queue = queue_with(&[0x99]);
        assert_eq!(
            next_packet::<ServerPacket>(&mut queue).unwrap(),
            Dispatch::Unknown(0x99)
        );
        assert_eq!(
            next_packet::<ServerPacket>(&mut queue).unwrap(),
            Dispatch::Empty
        );
    }

    #[test]
    fn test_negative_chunk_size_is_malformed() {
        let mut bytes = vec![0x33];
        bytes.extend_from_slice(&[0; 8]);
        bytes.push(1);
        bytes.extend_from_slice(&[0; 4]);
        bytes.extend_from_slice(&(-5i32).to_be_bytes());
        let mut queue = queue_with(&bytes);
        match next_packet::<ServerPacket>(&mut queue) {
            Err(ProxyError::MalformedPacket {
                side: Side::Server,
                id: 0x33,
                ..
            }) => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_window_contents_with_slots() {
        let mut queue = queue_with(&[
            0x68, 0x01, 0x00, 0x02, // window 1, two slots
            0xff, 0xff, // empty
            0x00, 0x05, 0x01, 0x00, 0x00, 0x00, 0x00, // item 5
        ]);
        match next_packet::<ServerPacket>(&mut queue).unwrap() {
            Dispatch::Packet(PacketId::WindowContents, ServerPacket::WindowContents { slots, .. }) => {
                assert_eq!(slots.len(), 2);
                assert_eq!(slots[0], ItemSlot::Empty);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_window_contents_partial_slot() {
        let mut queue = queue_with(&[0x68, 0x01, 0x00, 0x02, 0xff, 0xff, 0x00, 0x05]);
        assert_eq!(
            next_packet::<ServerPacket>(&mut queue).unwrap(),
            Dispatch::Incomplete
        );
        assert_eq!(queue.readable(), 8);
    }
}
