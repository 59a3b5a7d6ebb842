//! # Relay Engine
//!
//! The protocol half of a connection session, free of any I/O.
//!
//! The session feeds each chunk read from a socket into
//! [`Relay::handle_inbound`] and writes out whatever [`Relay::take_outbound`]
//! returns for each side. Everything in between happens here: decryption,
//! queueing, packet dispatch, the split key exchange and the fallback to blind
//! relay.
//!
//! ## Holding server traffic
//! Once the server side is encrypted the server's packets can only be relayed
//! to a client that is encrypted as well. Until the client finishes its half of
//! the key exchange, decrypted server bytes stay queued and are dispatched as
//! soon as the client side switches over.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tracing::{debug, info, trace, warn};

use crate::config::{ProxyConfig, DEFAULT_MAX_ENCRYPTED_BLOB, DEFAULT_UPSTREAM_PORT};
use crate::core::packet::{ClientPacket, Handshake, KeyRequest, KeyResponse, PacketId, ServerPacket};
use crate::core::queue::{ByteQueue, DEFAULT_QUEUE_CAPACITY};
use crate::error::{constants, ProxyError, Result};
use crate::protocol::dispatcher::{next_packet, Dispatch, PacketTable};
use crate::protocol::handshake::{self, PendingNonce};
use crate::protocol::state::EncryptionState;
use crate::service::keys::ProxyKeys;
use crate::utils::crypto::{CipherContext, CipherMode, SECRET_LEN};
use crate::utils::hexdump::HexDump;
use crate::utils::metrics::Metrics;
use crate::Side;

/// Per-session relay parameters
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// Bound on each direction's byte queue
    pub queue_capacity: usize,
    /// Longest accepted encrypted field in a client key response
    pub max_encrypted_blob: usize,
    /// Port written into the client handshake forwarded upstream
    pub upstream_port: u16,
    /// Emit hex dumps of received, decrypted and sent bytes at trace level
    pub hex_dumps: bool,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_encrypted_blob: DEFAULT_MAX_ENCRYPTED_BLOB,
            upstream_port: DEFAULT_UPSTREAM_PORT,
            hex_dumps: false,
        }
    }
}

impl From<&ProxyConfig> for RelaySettings {
    fn from(config: &ProxyConfig) -> Self {
        Self {
            queue_capacity: config.relay.queue_capacity,
            max_encrypted_blob: config.relay.max_encrypted_blob,
            upstream_port: config.upstream.port,
            hex_dumps: config.logging.hex_dumps,
        }
    }
}

/// Everything the relay keeps for one side of the connection
#[derive(Debug)]
struct Endpoint {
    side: Side,
    hex_dumps: bool,
    /// Bytes received from this side, decrypted, awaiting dispatch
    queue: ByteQueue,
    state: EncryptionState,
    decryptor: CipherContext,
    encryptor: CipherContext,
    /// Bytes to be written to this side, already encrypted if required
    outbox: BytesMut,
}

impl Endpoint {
    fn new(side: Side, settings: &RelaySettings) -> Self {
        Self {
            side,
            hex_dumps: settings.hex_dumps,
            queue: ByteQueue::new(settings.queue_capacity),
            state: EncryptionState::Unencrypted,
            decryptor: CipherContext::new(CipherMode::Decrypt),
            encryptor: CipherContext::new(CipherMode::Encrypt),
            outbox: BytesMut::new(),
        }
    }

    /// Queue bytes for this side, encrypting them if its state requires
    fn send(&mut self, bytes: &[u8]) {
        if self.hex_dumps {
            trace!(to = %self.side, dump = %HexDump(bytes), "Sending {} bytes", bytes.len());
        }
        let start = self.outbox.len();
        self.outbox.extend_from_slice(bytes);
        if self.state.is_encrypted() {
            self.encryptor.process(&mut self.outbox[start..]);
        }
    }

    fn key(&mut self, secret: &[u8; SECRET_LEN]) {
        self.decryptor.set_key(secret);
        self.encryptor.set_key(secret);
    }

    /// Switch to encrypted operation. Unread bytes that arrived in the same
    /// chunk as the switch are ciphertext and get decrypted in place.
    fn start_encryption(&mut self) -> Result<()> {
        self.state.advance_to(EncryptionState::EncryptedUnderstood)?;
        self.decryptor.process(self.queue.unread_mut());
        Ok(())
    }
}

/// Relay state for one proxied connection
pub struct Relay {
    client: Endpoint,
    server: Endpoint,
    keys: Arc<ProxyKeys>,
    settings: RelaySettings,
    metrics: Arc<Metrics>,
    /// Nonce sent to the client, until its key response validates
    pending_nonce: Option<PendingNonce>,
    /// A key response went to the server and its acknowledgement is due
    awaiting_server_ack: bool,
}

impl Relay {
    pub fn new(keys: Arc<ProxyKeys>, settings: RelaySettings, metrics: Arc<Metrics>) -> Self {
        Self {
            client: Endpoint::new(Side::Client, &settings),
            server: Endpoint::new(Side::Server, &settings),
            keys,
            settings,
            metrics,
            pending_nonce: None,
            awaiting_server_ack: false,
        }
    }

    pub fn state(&self, side: Side) -> EncryptionState {
        self.endpoint(side).state
    }

    /// Uncommitted bytes queued from `side`
    pub fn buffered(&self, side: Side) -> usize {
        self.endpoint(side).queue.uncommitted()
    }

    /// Take the bytes due to be written to `to`
    pub fn take_outbound(&mut self, to: Side) -> Option<Bytes> {
        let outbox = &mut self.endpoint_mut(to).outbox;
        if outbox.is_empty() {
            return None;
        }
        Some(outbox.split().freeze())
    }

    /// Process one chunk read from `from`. The chunk is decrypted in place.
    ///
    /// # Errors
    /// Any error is fatal to the session: a full queue, an unknown packet while
    /// unencrypted, or a malformed packet.
    pub fn handle_inbound(&mut self, from: Side, data: &mut [u8]) -> Result<()> {
        self.metrics.bytes_received(from, data.len());
        let hex_dumps = self.settings.hex_dumps;
        if hex_dumps {
            trace!(%from, dump = %HexDump(data), "Received {} bytes", data.len());
        }
        let (source, target) = self.endpoints(from);
        if source.state.is_encrypted() {
            source.decryptor.process(data);
            if hex_dumps {
                trace!(%from, dump = %HexDump(data), "Decrypted {} bytes", data.len());
            }
        }
        if source.state == EncryptionState::EncryptedUnknown {
            target.send(data);
            debug!(%from, bytes = data.len(), "Relayed blind");
            return Ok(());
        }
        source.queue.write(data)?;
        self.dispatch(from)
    }

    fn endpoint(&self, side: Side) -> &Endpoint {
        match side {
            Side::Client => &self.client,
            Side::Server => &self.server,
        }
    }

    fn endpoint_mut(&mut self, side: Side) -> &mut Endpoint {
        match side {
            Side::Client => &mut self.client,
            Side::Server => &mut self.server,
        }
    }

    /// The endpoint bytes come from and the one they are relayed to
    fn endpoints(&mut self, from: Side) -> (&mut Endpoint, &mut Endpoint) {
        match from {
            Side::Client => (&mut self.client, &mut self.server),
            Side::Server => (&mut self.server, &mut self.client),
        }
    }

    fn is_held(&self, side: Side) -> bool {
        side == Side::Server && self.server.state.is_encrypted() && !self.client.state.is_encrypted()
    }

    /// Decode and handle packets from `side` until the queue runs dry
    fn dispatch(&mut self, side: Side) -> Result<()> {
        loop {
            if !self.endpoint(side).state.is_decoded() {
                return Ok(());
            }
            if self.is_held(side) {
                trace!(held = self.buffered(side), "Holding server traffic");
                return Ok(());
            }
            let progressed = match side {
                Side::Client => self.step(Self::on_client_packet)?,
                Side::Server => self.step(Self::on_server_packet)?,
            };
            if !progressed {
                return Ok(());
            }
        }
    }

    /// Handle at most one packet; `false` when no packet could be completed
    fn step<P: PacketTable>(&mut self, handle: fn(&mut Self, PacketId, P) -> Result<()>) -> Result<bool> {
        let side = P::SIDE;
        let outcome = match next_packet::<P>(&mut self.endpoint_mut(side).queue) {
            Ok(outcome) => outcome,
            Err(e @ ProxyError::MalformedPacket { .. }) if self.endpoint(side).state.is_encrypted() => {
                warn!(from = %side, error = %e, "Undecodable packet while encrypted");
                self.fall_back_blind(side)?;
                return Ok(false);
            }
            Err(e) => {
                self.metrics.protocol_error();
                return Err(e);
            }
        };
        match outcome {
            Dispatch::Empty | Dispatch::Incomplete => Ok(false),
            Dispatch::Unknown(id) => {
                self.unknown_packet(side, id)?;
                Ok(false)
            }
            Dispatch::Packet(id, packet) => {
                self.metrics.packet_decoded();
                debug!(from = %side, %id, ?packet, "Packet");
                handle(self, id, packet)?;
                Ok(true)
            }
        }
    }

    /// Relay the bytes of the packet just decoded, unchanged
    fn forward(&mut self, from: Side) {
        let (source, target) = self.endpoints(from);
        target.send(source.queue.read_again());
        source.queue.commit();
    }

    /// Drop the packet just decoded
    fn consume(&mut self, from: Side) {
        self.endpoint_mut(from).queue.commit();
    }

    fn unknown_packet(&mut self, side: Side, id: u8) -> Result<()> {
        if self.endpoint(side).state == EncryptionState::Unencrypted {
            self.metrics.protocol_error();
            return Err(ProxyError::UnknownPacket { side, id });
        }
        warn!(from = %side, id = %format!("0x{id:02x}"), "Unknown packet while encrypted");
        self.fall_back_blind(side)
    }

    /// Give up decoding `side`: flush everything it has buffered to the other
    /// side and relay its traffic uninterpreted from now on.
    fn fall_back_blind(&mut self, side: Side) -> Result<()> {
        let (source, target) = self.endpoints(side);
        source.state.advance_to(EncryptionState::EncryptedUnknown)?;
        source.queue.reset();
        let pending = source.queue.take_uncommitted();
        if source.hex_dumps {
            trace!(from = %side, dump = %HexDump(&pending), "Current data in the packet queue");
        }
        target.send(&pending);
        self.metrics.blind_fallback();
        warn!(from = %side, to = %side.opposite(), flushed = pending.len(), "Falling back to blind relay");
        Ok(())
    }

    fn abort_handshake(&self, side: Side, error: &ProxyError) {
        self.metrics.handshake_failed();
        warn!(%side, %error, "Key exchange step aborted");
    }

    fn on_client_packet(&mut self, _id: PacketId, packet: ClientPacket) -> Result<()> {
        match packet {
            ClientPacket::Handshake(handshake) => {
                self.consume(Side::Client);
                info!(
                    username = %handshake.username,
                    host = %handshake.server_host,
                    port = handshake.server_port,
                    protocol = handshake.protocol_version,
                    "Client handshake"
                );
                let rewritten = Handshake {
                    server_port: i32::from(self.settings.upstream_port),
                    ..handshake
                };
                self.server.send(&rewritten.encode());
            }
            ClientPacket::EncryptionKeyResponse(response) => {
                self.consume(Side::Client);
                self.on_client_key_response(&response)?;
            }
            ClientPacket::ChatMessage { message } => {
                info!(%message, "Client chat");
                self.forward(Side::Client);
            }
            ClientPacket::Disconnect { reason } => {
                info!(%reason, "Client disconnecting");
                self.forward(Side::Client);
            }
            _ => self.forward(Side::Client),
        }
        Ok(())
    }

    fn on_server_packet(&mut self, _id: PacketId, packet: ServerPacket) -> Result<()> {
        match packet {
            ServerPacket::EncryptionKeyRequest(request) => {
                self.consume(Side::Server);
                self.on_server_key_request(&request);
            }
            ServerPacket::EncryptionKeyResponse(response) => {
                self.consume(Side::Server);
                self.on_server_key_ack(&response)?;
            }
            ServerPacket::Login {
                entity_id,
                level_type,
                ..
            } => {
                info!(entity_id, %level_type, "Logged in");
                self.forward(Side::Server);
            }
            ServerPacket::ChatMessage { message } => {
                info!(%message, "Server chat");
                self.forward(Side::Server);
            }
            ServerPacket::Kick { reason } => {
                info!(%reason, "Kicked by server");
                self.forward(Side::Server);
            }
            _ => self.forward(Side::Server),
        }
        Ok(())
    }

    /// Answer the server ourselves and send the client our own key request
    fn on_server_key_request(&mut self, request: &KeyRequest) {
        info!(server_id = %request.server_id, "Server requested encryption");
        if self.awaiting_server_ack || self.server.state.is_encrypted() {
            let error = ProxyError::HandshakeError(constants::ERR_UNEXPECTED_KEY_REQUEST);
            self.abort_handshake(Side::Server, &error);
            return;
        }
        let (secret, response) = match handshake::server_key_response(request) {
            Ok(answer) => answer,
            Err(e) => {
                self.abort_handshake(Side::Server, &e);
                return;
            }
        };
        self.server.key(&secret);
        self.server.send(&response.encode());
        self.awaiting_server_ack = true;

        let (nonce, client_request) = handshake::client_key_request(request, self.keys.public_der());
        self.pending_nonce = Some(nonce);
        self.client.send(&client_request.encode());
    }

    fn on_server_key_ack(&mut self, response: &KeyResponse) -> Result<()> {
        if !self.awaiting_server_ack {
            let error = ProxyError::HandshakeError(constants::ERR_UNEXPECTED_ACK);
            self.abort_handshake(Side::Server, &error);
            return Ok(());
        }
        self.awaiting_server_ack = false;
        if !response.is_acknowledgement() {
            let error = ProxyError::HandshakeError(constants::ERR_NONZERO_ACK);
            self.abort_handshake(Side::Server, &error);
            return Ok(());
        }
        self.server.start_encryption()?;
        self.metrics.handshake_completed(Side::Server);
        info!("Server side encrypted");
        Ok(())
    }

    fn on_client_key_response(&mut self, response: &KeyResponse) -> Result<()> {
        let Some(pending) = self.pending_nonce.as_ref() else {
            let error = ProxyError::HandshakeError(constants::ERR_NO_PENDING_NONCE);
            self.abort_handshake(Side::Client, &error);
            return Ok(());
        };
        let verified = handshake::check_blob_lengths(response, self.settings.max_encrypted_blob)
            .and_then(|()| handshake::client_key_verify(self.keys.private_key(), pending, response));
        let secret = match verified {
            Ok(secret) => secret,
            Err(e) => {
                self.abort_handshake(Side::Client, &e);
                return Ok(());
            }
        };
        self.pending_nonce = None;

        // The acknowledgement is the last plaintext the client sees
        self.client.send(&KeyResponse::acknowledgement().encode());
        self.client.key(&secret);
        self.client.start_encryption()?;
        self.metrics.handshake_completed(Side::Client);
        info!("Client side encrypted");

        self.dispatch(Side::Server)
    }
}

impl std::fmt::Debug for Relay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relay")
            .field("client", &self.client.state)
            .field("server", &self.server.state)
            .field("awaiting_server_ack", &self.awaiting_server_ack)
            .finish_non_exhaustive()
    }
}
