//! The proxy's own RSA keypair.
//!
//! Presented to clients in place of the server's key. Loaded once at startup
//! and shared read-only by every session.

use std::path::Path;

use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, EncodePublicKey};
use rsa::RsaPrivateKey;
use tracing::info;

use crate::config::KeyConfig;
use crate::error::{ProxyError, Result};

pub struct ProxyKeys {
    private_key: RsaPrivateKey,
    /// DER SubjectPublicKeyInfo, as sent in key requests
    public_der: Vec<u8>,
}

impl ProxyKeys {
    pub fn from_private_key(private_key: RsaPrivateKey) -> Result<Self> {
        let public_der = private_key
            .to_public_key()
            .to_public_key_der()
            .map_err(|e| ProxyError::KeyEncoding(e.to_string()))?
            .as_bytes()
            .to_vec();
        Ok(Self {
            private_key,
            public_der,
        })
    }

    /// Generate a fresh keypair of `bits` bits
    pub fn generate(bits: usize) -> Result<Self> {
        Self::from_private_key(RsaPrivateKey::new(&mut OsRng, bits)?)
    }

    /// Load a PKCS#8 PEM private key
    pub fn from_pem_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let pem = std::fs::read_to_string(path)?;
        let private_key =
            RsaPrivateKey::from_pkcs8_pem(&pem).map_err(|e| ProxyError::KeyEncoding(e.to_string()))?;
        Self::from_private_key(private_key)
    }

    /// Load the configured key file, or generate a keypair when none is set
    pub fn load_or_generate(config: &KeyConfig) -> Result<Self> {
        match &config.private_key_path {
            Some(path) => {
                let keys = Self::from_pem_file(path)?;
                info!(path = %path.display(), "Loaded proxy key");
                Ok(keys)
            }
            None => {
                let keys = Self::generate(config.key_bits)?;
                info!(bits = config.key_bits, "Generated proxy key");
                Ok(keys)
            }
        }
    }

    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }

    pub fn public_der(&self) -> &[u8] {
        &self.public_der
    }
}

impl std::fmt::Debug for ProxyKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyKeys")
            .field("public_der_len", &self.public_der.len())
            .finish_non_exhaustive()
    }
}
