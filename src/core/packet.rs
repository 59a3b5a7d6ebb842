//! Packet identifiers and decoded packet records.
//!
//! Records hold the fields the proxy logs. Most packets are forwarded as the
//! exact bytes they were decoded from, so only the handshake-related records
//! know how to encode themselves.

use bytes::BytesMut;

use crate::core::codec::{PacketWriter, String16};
use crate::core::slot::ItemSlot;

/// One-byte packet identifiers understood by the proxy
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketId {
    KeepAlive = 0x00,
    Login = 0x01,
    Handshake = 0x02,
    ChatMessage = 0x03,
    TimeUpdate = 0x04,
    EntityEquipment = 0x05,
    Compass = 0x06,
    UpdateHealth = 0x08,
    PlayerOnGround = 0x0a,
    PlayerPosition = 0x0b,
    PlayerLook = 0x0c,
    PlayerPositionLook = 0x0d,
    BlockPlace = 0x0f,
    SlotSelect = 0x10,
    Animation = 0x12,
    MapChunk = 0x33,
    MultiBlockChange = 0x34,
    BlockChange = 0x35,
    WindowContents = 0x68,
    UpdateSign = 0x82,
    PlayerListItem = 0xc9,
    PlayerAbilities = 0xca,
    LocaleAndView = 0xcc,
    ClientStatuses = 0xcd,
    EncryptionKeyResponse = 0xfc,
    EncryptionKeyRequest = 0xfd,
    Ping = 0xfe,
    Kick = 0xff,
}

impl PacketId {
    /// Look up an identifier byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        use PacketId::*;
        let id = match byte {
            0x00 => KeepAlive,
            0x01 => Login,
            0x02 => Handshake,
            0x03 => ChatMessage,
            0x04 => TimeUpdate,
            0x05 => EntityEquipment,
            0x06 => Compass,
            0x08 => UpdateHealth,
            0x0a => PlayerOnGround,
            0x0b => PlayerPosition,
            0x0c => PlayerLook,
            0x0d => PlayerPositionLook,
            0x0f => BlockPlace,
            0x10 => SlotSelect,
            0x12 => Animation,
            0x33 => MapChunk,
            0x34 => MultiBlockChange,
            0x35 => BlockChange,
            0x68 => WindowContents,
            0x82 => UpdateSign,
            0xc9 => PlayerListItem,
            0xca => PlayerAbilities,
            0xcc => LocaleAndView,
            0xcd => ClientStatuses,
            0xfc => EncryptionKeyResponse,
            0xfd => EncryptionKeyRequest,
            0xfe => Ping,
            0xff => Kick,
            _ => return None,
        };
        Some(id)
    }

    pub fn byte(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for PacketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:02x} {:?}", self.byte(), self)
    }
}

/// Client's opening packet. Strings keep their raw units so the packet can be
/// rewritten without altering them.
#[derive(Debug, Clone, PartialEq)]
pub struct Handshake {
    pub protocol_version: u8,
    pub username: String16,
    pub server_host: String16,
    pub server_port: i32,
}

impl Handshake {
    pub fn encode(&self) -> BytesMut {
        PacketWriter::new(PacketId::Handshake.byte())
            .u8(self.protocol_version)
            .utf16(self.username.units())
            .utf16(self.server_host.units())
            .i32(self.server_port)
            .finish()
    }
}

/// Server's request to start encryption
#[derive(Debug, Clone, PartialEq)]
pub struct KeyRequest {
    pub server_id: String,
    /// DER-encoded SubjectPublicKeyInfo
    pub public_key: Vec<u8>,
    pub nonce: Vec<u8>,
}

impl KeyRequest {
    pub fn encode(&self) -> BytesMut {
        PacketWriter::new(PacketId::EncryptionKeyRequest.byte())
            .string16(&self.server_id)
            .blob16(&self.public_key)
            .blob16(&self.nonce)
            .finish()
    }
}

/// Encrypted shared secret and nonce; both empty when acknowledging
#[derive(Clone, PartialEq)]
pub struct KeyResponse {
    pub encrypted_secret: Vec<u8>,
    pub encrypted_nonce: Vec<u8>,
}

impl KeyResponse {
    /// The empty response that confirms a completed key exchange
    pub fn acknowledgement() -> Self {
        Self {
            encrypted_secret: Vec::new(),
            encrypted_nonce: Vec::new(),
        }
    }

    pub fn is_acknowledgement(&self) -> bool {
        self.encrypted_secret.is_empty() && self.encrypted_nonce.is_empty()
    }

    pub fn encode(&self) -> BytesMut {
        PacketWriter::new(PacketId::EncryptionKeyResponse.byte())
            .blob16(&self.encrypted_secret)
            .blob16(&self.encrypted_nonce)
            .finish()
    }
}

impl std::fmt::Debug for KeyResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyResponse")
            .field("encrypted_secret_len", &self.encrypted_secret.len())
            .field("encrypted_nonce_len", &self.encrypted_nonce.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignUpdate {
    pub x: i32,
    pub y: i16,
    pub z: i32,
    pub lines: [String; 4],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionLook {
    pub x: f64,
    pub stance: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
    pub on_ground: bool,
}

/// Packets sent by the client
#[derive(Debug, Clone, PartialEq)]
pub enum ClientPacket {
    KeepAlive {
        id: i32,
    },
    Handshake(Handshake),
    ChatMessage {
        message: String,
    },
    PlayerOnGround {
        on_ground: bool,
    },
    PlayerPosition {
        x: f64,
        stance: f64,
        y: f64,
        z: f64,
        on_ground: bool,
    },
    PlayerLook {
        yaw: f32,
        pitch: f32,
        on_ground: bool,
    },
    PlayerPositionLook(PositionLook),
    BlockPlace {
        x: i32,
        y: u8,
        z: i32,
        face: i8,
        item: ItemSlot,
        cursor: [i8; 3],
    },
    SlotSelect {
        slot: i16,
    },
    Animation {
        entity_id: i32,
        animation: i8,
    },
    UpdateSign(SignUpdate),
    LocaleAndView {
        locale: String,
        view_distance: i8,
        chat_flags: i8,
        difficulty: i8,
    },
    ClientStatuses {
        statuses: i8,
    },
    EncryptionKeyResponse(KeyResponse),
    Ping,
    Disconnect {
        reason: String,
    },
}

/// Packets sent by the server
#[derive(Debug, Clone, PartialEq)]
pub enum ServerPacket {
    KeepAlive {
        id: i32,
    },
    Login {
        entity_id: i32,
        level_type: String,
        game_mode: i8,
        dimension: i8,
        difficulty: i8,
        unused: i8,
        max_players: i8,
    },
    ChatMessage {
        message: String,
    },
    TimeUpdate {
        time: i64,
    },
    EntityEquipment {
        entity_id: i32,
        slot: i16,
        item: ItemSlot,
    },
    Compass {
        x: i32,
        y: i32,
        z: i32,
    },
    UpdateHealth {
        health: i16,
        food: i16,
        saturation: f32,
    },
    PlayerPositionLook(PositionLook),
    MapChunk {
        x: i32,
        z: i32,
        contiguous: bool,
        primary_bitmap: u16,
        add_bitmap: u16,
        compressed_len: usize,
    },
    MultiBlockChange {
        x: i32,
        z: i32,
        block_count: i16,
        data_len: usize,
    },
    BlockChange {
        x: i32,
        y: u8,
        z: i32,
        block_type: i16,
        block_meta: i8,
    },
    WindowContents {
        window_id: i8,
        slots: Vec<ItemSlot>,
    },
    UpdateSign(SignUpdate),
    PlayerListItem {
        name: String,
        online: bool,
        ping: i16,
    },
    PlayerAbilities {
        flags: i8,
        flying_speed: i8,
        walking_speed: i8,
    },
    EncryptionKeyRequest(KeyRequest),
    EncryptionKeyResponse(KeyResponse),
    Kick {
        reason: String,
    },
}
