//! Per-item content encryption.
//!
//! Every encrypted block (tree node or file data) gets its own random
//! [`Secret`]. The secret travels inside the parent node's link, so holding
//! the root secret transitively unlocks the whole tree, while individual
//! file secrets can be handed out on their own (see `Mount::share_file`).

use std::ops::Deref;

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};

/// Size of a ChaCha20-Poly1305 nonce in bytes
pub const NONCE_SIZE: usize = 12;
/// Size of a ChaCha20-Poly1305 key in bytes
pub const SECRET_SIZE: usize = 32;

const PLAINTEXT_HASH_SIZE: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("secret error: {0}")]
    Default(#[from] anyhow::Error),
}

/// A 256-bit symmetric key encrypting a single block.
///
/// Ciphertext layout: `nonce (12) || aead(blake3(plain) (32) || plain)`.
/// The sealed BLAKE3 digest lets decryption detect corruption that slipped
/// past the store, independent of the AEAD tag.
#[serde_as]
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Secret(#[serde_as(as = "Bytes")] [u8; SECRET_SIZE]);

impl Default for Secret {
    fn default() -> Self {
        Secret([0; SECRET_SIZE])
    }
}

impl Deref for Secret {
    type Target = [u8; SECRET_SIZE];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<[u8; SECRET_SIZE]> for Secret {
    fn from(bytes: [u8; SECRET_SIZE]) -> Self {
        Secret(bytes)
    }
}

impl Secret {
    /// Generate a new random secret using a cryptographically secure RNG
    pub fn generate() -> Self {
        let mut buff = [0; SECRET_SIZE];
        getrandom::getrandom(&mut buff).expect("failed to generate random bytes");
        Self(buff)
    }

    /// Create a secret from a byte slice of exactly `SECRET_SIZE` bytes
    pub fn from_slice(data: &[u8]) -> Result<Self, SecretError> {
        if data.len() != SECRET_SIZE {
            return Err(anyhow::anyhow!(
                "invalid secret size, expected {}, got {}",
                SECRET_SIZE,
                data.len()
            )
            .into());
        }
        let mut buff = [0; SECRET_SIZE];
        buff.copy_from_slice(data);
        Ok(buff.into())
    }

    pub fn bytes(&self) -> &[u8] {
        self.0.as_ref()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, SecretError> {
        let hex_str = hex_str.strip_prefix("0x").unwrap_or(hex_str);
        let mut buff = [0; SECRET_SIZE];
        hex::decode_to_slice(hex_str, &mut buff)
            .map_err(|_| anyhow::anyhow!("secret hex decode error"))?;
        Ok(buff.into())
    }

    /// Encrypt a block, prepending a sealed BLAKE3 digest of the plaintext.
    /// A fresh random nonce is drawn per call.
    pub fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, SecretError> {
        let plaintext_hash = blake3::hash(data);

        let mut sealed = Vec::with_capacity(PLAINTEXT_HASH_SIZE + data.len());
        sealed.extend_from_slice(plaintext_hash.as_bytes());
        sealed.extend_from_slice(data);

        let cipher = ChaCha20Poly1305::new(Key::from_slice(self.bytes()));

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        getrandom::getrandom(&mut nonce_bytes)
            .map_err(|e| anyhow::anyhow!("failed to generate nonce: {}", e))?;
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, sealed.as_ref())
            .map_err(|_| anyhow::anyhow!("encrypt error"))?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(nonce.as_ref());
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypt a block and verify the sealed plaintext digest.
    ///
    /// # Errors
    ///
    /// Fails if the input is truncated, the AEAD tag does not verify
    /// (wrong key or tampering), or the digest check fails (corruption).
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, SecretError> {
        if data.len() < NONCE_SIZE {
            return Err(anyhow::anyhow!("data too short for nonce").into());
        }

        let cipher = ChaCha20Poly1305::new(Key::from_slice(self.bytes()));
        let nonce = Nonce::from_slice(&data[..NONCE_SIZE]);
        let sealed = cipher
            .decrypt(nonce, &data[NONCE_SIZE..])
            .map_err(|_| anyhow::anyhow!("decrypt error"))?;

        if sealed.len() < PLAINTEXT_HASH_SIZE {
            return Err(anyhow::anyhow!("decrypted data too short for digest header").into());
        }

        let stored_hash = &sealed[..PLAINTEXT_HASH_SIZE];
        let plaintext = &sealed[PLAINTEXT_HASH_SIZE..];

        if stored_hash != blake3::hash(plaintext).as_bytes() {
            return Err(anyhow::anyhow!("digest verification failed, data corrupted").into());
        }

        Ok(plaintext.to_vec())
    }
}
