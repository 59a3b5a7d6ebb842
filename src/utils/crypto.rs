//! # Cipher Context
//!
//! AES-128 in CFB-8 mode, the stream construction the protocol switches to once
//! a shared secret is established. The secret doubles as the IV.
//!
//! CFB-8 is self-synchronizing and processes one byte at a time, so a context
//! can be fed arbitrarily split network chunks and keeps its feedback register
//! across calls. Each session holds four contexts: an encryptor and a decryptor
//! per side.

use aes::Aes128;
use cfb8::cipher::generic_array::GenericArray;
use cfb8::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};

/// Length of the shared secret and of the AES key
pub const SECRET_LEN: usize = 16;

/// Which direction of the stream cipher a context applies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherMode {
    Encrypt,
    Decrypt,
}

enum Stream {
    Encrypt(Box<cfb8::Encryptor<Aes128>>),
    Decrypt(Box<cfb8::Decryptor<Aes128>>),
}

/// A keyed or not-yet-keyed stream cipher for one flow of bytes.
///
/// Processing through an unkeyed context leaves the bytes untouched.
pub struct CipherContext {
    mode: CipherMode,
    stream: Option<Stream>,
}

impl CipherContext {
    pub fn new(mode: CipherMode) -> Self {
        Self { mode, stream: None }
    }

    pub fn is_keyed(&self) -> bool {
        self.stream.is_some()
    }

    /// Key the context with a shared secret, resetting the feedback register.
    /// The feedback size is fixed at 8 bits.
    pub fn set_key(&mut self, secret: &[u8; SECRET_LEN]) {
        let key = GenericArray::from_slice(secret);
        let stream = match self.mode {
            CipherMode::Encrypt => Stream::Encrypt(Box::new(cfb8::Encryptor::new(key, key))),
            CipherMode::Decrypt => Stream::Decrypt(Box::new(cfb8::Decryptor::new(key, key))),
        };
        self.stream = Some(stream);
    }

    /// Transform `buf` in place
    pub fn process(&mut self, buf: &mut [u8]) {
        match &mut self.stream {
            None => {}
            Some(Stream::Encrypt(cipher)) => {
                for byte in buf.iter_mut() {
                    cipher.encrypt_block_mut(GenericArray::from_mut_slice(std::slice::from_mut(byte)));
                }
            }
            Some(Stream::Decrypt(cipher)) => {
                for byte in buf.iter_mut() {
                    cipher.decrypt_block_mut(GenericArray::from_mut_slice(std::slice::from_mut(byte)));
                }
            }
        }
    }
}

impl std::fmt::Debug for CipherContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherContext")
            .field("mode", &self.mode)
            .field("keyed", &self.is_keyed())
            .finish()
    }
}
