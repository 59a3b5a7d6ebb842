//! Split RSA key exchange.
//!
//! The server's key request is answered by the proxy itself, with a secret the
//! proxy chose, while the client receives a fresh request carrying the proxy's
//! own public key and nonce. Both halves finish with independent AES secrets,
//! so each peer believes it negotiated directly with the other.
//!
//! ```text
//! server --0xFD(id, K_s, N)--> proxy --0xFD(id, K_p, N')--> client
//! server <--0xFC(E_Ks(S1), E_Ks(N))-- proxy
//! server --0xFC(empty)-------> proxy                         server side keyed with S1
//!                              proxy <--0xFC(E_Kp(S2), E_Kp(N'))-- client
//!                              proxy --0xFC(empty)-------> client   client side keyed with S2
//! ```
//!
//! The functions here are pure apart from drawing randomness; the relay engine
//! owns the resulting secrets and cipher contexts.

use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use tracing::{debug, instrument};
use zeroize::Zeroizing;

use crate::core::packet::{KeyRequest, KeyResponse};
use crate::error::{constants, ProxyError, Result};
use crate::utils::crypto::SECRET_LEN;

/// Length of the nonce the proxy issues to the client
pub const NONCE_LEN: usize = 4;

/// A shared secret, wiped from memory on drop
pub type SharedSecret = Zeroizing<[u8; SECRET_LEN]>;

/// The nonce issued to the client, awaiting its echo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingNonce([u8; NONCE_LEN]);

impl PendingNonce {
    /// Draw a random nonce that differs from `avoid`
    pub fn generate(avoid: &[u8]) -> Self {
        loop {
            let nonce = OsRng.next_u32().to_be_bytes();
            if nonce[..] != *avoid {
                return Self(nonce);
            }
        }
    }

    pub fn as_bytes(&self) -> &[u8; NONCE_LEN] {
        &self.0
    }
}

/// Generate a fresh random shared secret
pub fn generate_secret() -> SharedSecret {
    let mut secret = Zeroizing::new([0u8; SECRET_LEN]);
    OsRng.fill_bytes(&mut secret[..]);
    secret
}

/// Answer the server's key request with a secret of the proxy's choosing.
///
/// Returns the secret for the server-side cipher contexts and the key response
/// to send to the server.
///
/// # Errors
/// Returns `ProxyError::KeyEncoding` if the server's public key is not a DER
/// SubjectPublicKeyInfo RSA key, or `ProxyError::Rsa` if encryption fails.
#[instrument(skip(request), fields(server_id = %request.server_id))]
pub fn server_key_response(request: &KeyRequest) -> Result<(SharedSecret, KeyResponse)> {
    let server_key = RsaPublicKey::from_public_key_der(&request.public_key)
        .map_err(|e| ProxyError::KeyEncoding(e.to_string()))?;
    let secret = generate_secret();
    let response = KeyResponse {
        encrypted_secret: server_key.encrypt(&mut OsRng, Pkcs1v15Encrypt, &secret[..])?,
        encrypted_nonce: server_key.encrypt(&mut OsRng, Pkcs1v15Encrypt, &request.nonce)?,
    };
    debug!(
        key_len = request.public_key.len(),
        nonce_len = request.nonce.len(),
        "Answered server key request"
    );
    Ok((secret, response))
}

/// Build the key request sent to the client in place of the server's.
///
/// The request keeps the server identifier but carries the proxy's public key
/// and a fresh nonce that never equals the server's.
pub fn client_key_request(server: &KeyRequest, proxy_public_der: &[u8]) -> (PendingNonce, KeyRequest) {
    let nonce = PendingNonce::generate(&server.nonce);
    let request = KeyRequest {
        server_id: server.server_id.clone(),
        public_key: proxy_public_der.to_vec(),
        nonce: nonce.as_bytes().to_vec(),
    };
    (nonce, request)
}

/// Reject key responses whose encrypted fields exceed `max_len` bytes
pub fn check_blob_lengths(response: &KeyResponse, max_len: usize) -> Result<()> {
    if response.encrypted_secret.len() > max_len || response.encrypted_nonce.len() > max_len {
        return Err(ProxyError::HandshakeError(constants::ERR_BLOB_TOO_LONG));
    }
    Ok(())
}

/// Validate the client's key response and recover its shared secret.
///
/// # Errors
/// - `ProxyError::Rsa` if either field does not decrypt under the proxy key
/// - `ProxyError::HandshakeError` if the nonce is not the pending one or the
///   secret has the wrong length
#[instrument(skip_all)]
pub fn client_key_verify(
    private_key: &RsaPrivateKey,
    pending: &PendingNonce,
    response: &KeyResponse,
) -> Result<SharedSecret> {
    let nonce = Zeroizing::new(private_key.decrypt(Pkcs1v15Encrypt, &response.encrypted_nonce)?);
    if nonce.len() != NONCE_LEN {
        return Err(ProxyError::HandshakeError(constants::ERR_NONCE_LENGTH));
    }
    if nonce[..] != pending.as_bytes()[..] {
        return Err(ProxyError::HandshakeError(constants::ERR_NONCE_MISMATCH));
    }

    let decrypted = Zeroizing::new(private_key.decrypt(Pkcs1v15Encrypt, &response.encrypted_secret)?);
    let mut secret = Zeroizing::new([0u8; SECRET_LEN]);
    if decrypted.len() != SECRET_LEN {
        return Err(ProxyError::HandshakeError(constants::ERR_SECRET_LENGTH));
    }
    secret.copy_from_slice(&decrypted);
    debug!("Client key response verified");
    Ok(secret)
}
