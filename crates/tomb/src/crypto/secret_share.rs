//! Wrapping a tree secret for another principal.
//!
//! Sharing a bucket means re-wrapping its root [`Secret`] for the
//! recipient's public key:
//!
//! 1. generate an ephemeral Ed25519 keypair
//! 2. convert both keys to X25519 and run ECDH
//! 3. AES-KW (RFC 3394) wrap the secret under the shared key
//! 4. ship `ephemeral_pubkey || wrapped_secret`
//!
//! Only the holder of the recipient's private key can rerun the ECDH and
//! unwrap. The ephemeral private key is discarded immediately.

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};

use aes_kw::KekAes256 as Kek;

use super::keys::{KeyError, PublicKey, SecretKey, PUBLIC_KEY_SIZE};
use super::secret::{Secret, SecretError, SECRET_SIZE};

/// Overhead AES-KW adds to the wrapped 32-byte secret
pub const KW_OVERHEAD: usize = 8;
/// Total size of a share: ephemeral_pubkey (32) || wrapped_secret (40)
pub const SECRET_SHARE_SIZE: usize = PUBLIC_KEY_SIZE + SECRET_SIZE + KW_OVERHEAD;

#[derive(Debug, thiserror::Error)]
pub enum SecretShareError {
    #[error("share error: {0}")]
    Default(#[from] anyhow::Error),
    #[error("key error: {0}")]
    Key(#[from] KeyError),
    #[error("secret error: {0}")]
    Secret(#[from] SecretError),
}

/// An encrypted copy of a tree secret, recoverable only by one recipient.
#[serde_as]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct SecretShare(#[serde_as(as = "Bytes")] [u8; SECRET_SHARE_SIZE]);

impl Default for SecretShare {
    fn default() -> Self {
        SecretShare([0; SECRET_SHARE_SIZE])
    }
}

impl From<[u8; SECRET_SHARE_SIZE]> for SecretShare {
    fn from(bytes: [u8; SECRET_SHARE_SIZE]) -> Self {
        SecretShare(bytes)
    }
}

impl TryFrom<&[u8]> for SecretShare {
    type Error = SecretShareError;
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() != SECRET_SHARE_SIZE {
            return Err(anyhow::anyhow!(
                "invalid share size, expected {}, got {}",
                SECRET_SHARE_SIZE,
                bytes.len()
            )
            .into());
        }
        let mut share = SecretShare::default();
        share.0.copy_from_slice(bytes);
        Ok(share)
    }
}

impl SecretShare {
    /// Wrap `secret` for `recipient`.
    pub fn new(secret: &Secret, recipient: &PublicKey) -> Result<Self, SecretShareError> {
        let ephemeral_private = SecretKey::generate();
        let ephemeral_public = ephemeral_private.public();

        let shared_secret = ephemeral_private
            .to_x25519()
            .diffie_hellman(&recipient.to_x25519());

        let mut kek_bytes = [0; SECRET_SIZE];
        kek_bytes.copy_from_slice(shared_secret.as_bytes());
        let kek = Kek::from(kek_bytes);
        let wrapped = kek
            .wrap_vec(secret.bytes())
            .map_err(|_| anyhow::anyhow!("AES-KW wrap error"))?;

        let ephemeral_bytes = ephemeral_public.to_bytes();
        if ephemeral_bytes.len() + wrapped.len() != SECRET_SHARE_SIZE {
            return Err(anyhow::anyhow!("unexpected wrapped share size").into());
        }

        let mut share = SecretShare::default();
        share.0[..PUBLIC_KEY_SIZE].copy_from_slice(&ephemeral_bytes);
        share.0[PUBLIC_KEY_SIZE..].copy_from_slice(&wrapped);
        Ok(share)
    }

    /// Recover the wrapped secret with the recipient's private key.
    ///
    /// # Errors
    ///
    /// Fails if the share was created for a different recipient or the
    /// bytes were corrupted in transit.
    pub fn recover(&self, recipient_secret: &SecretKey) -> Result<Secret, SecretShareError> {
        let ephemeral_public = PublicKey::try_from(&self.0[..PUBLIC_KEY_SIZE])?;

        let shared_secret = recipient_secret
            .to_x25519()
            .diffie_hellman(&ephemeral_public.to_x25519());

        let kek = Kek::from(*shared_secret.as_bytes());
        let unwrapped = kek
            .unwrap_vec(&self.0[PUBLIC_KEY_SIZE..])
            .map_err(|_| anyhow::anyhow!("AES-KW unwrap error"))?;

        Ok(Secret::from_slice(&unwrapped)?)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, SecretShareError> {
        let hex_str = hex_str.strip_prefix("0x").unwrap_or(hex_str);
        let mut buff = [0; SECRET_SHARE_SIZE];
        hex::decode_to_slice(hex_str, &mut buff)
            .map_err(|_| anyhow::anyhow!("hex decode error"))?;
        Ok(SecretShare::from(buff))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}
