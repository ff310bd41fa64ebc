use std::cmp::Ordering;

use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};

/// Size of an Ed25519 private key in bytes
pub const PRIVATE_KEY_SIZE: usize = 32;
/// Size of an Ed25519 public key in bytes
pub const PUBLIC_KEY_SIZE: usize = 32;

const PRIVATE_PEM_TAG: &str = "PRIVATE KEY";
const PUBLIC_PEM_TAG: &str = "PUBLIC KEY";

#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("key error: {0}")]
    Default(#[from] anyhow::Error),
}

/// Public half of an Ed25519 keypair.
///
/// Identifies a device or bucket encryption key. Used for key sharing
/// (after conversion to X25519) and for authorizing version pushes: the
/// metadata store checks the author's fingerprint against the bucket's
/// access grants.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PublicKey(VerifyingKey);

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_bytes() == other.0.as_bytes()
    }
}

impl Eq for PublicKey {}

impl std::hash::Hash for PublicKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        state.write(self.0.as_bytes());
    }
}

impl PartialOrd for PublicKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PublicKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.as_bytes().cmp(other.0.as_bytes())
    }
}

impl TryFrom<&[u8]> for PublicKey {
    type Error = KeyError;
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() != PUBLIC_KEY_SIZE {
            return Err(anyhow::anyhow!(
                "invalid public key size, expected {}, got {}",
                PUBLIC_KEY_SIZE,
                bytes.len()
            )
            .into());
        }
        let mut buff = [0; PUBLIC_KEY_SIZE];
        buff.copy_from_slice(bytes);
        let key = VerifyingKey::from_bytes(&buff)
            .map_err(|_| anyhow::anyhow!("invalid public key bytes"))?;
        Ok(PublicKey(key))
    }
}

impl PublicKey {
    /// Parse a public key from a hexadecimal string
    ///
    /// Accepts both plain hex and "0x"-prefixed hex strings.
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let hex_str = hex_str.strip_prefix("0x").unwrap_or(hex_str);
        let mut buff = [0; PUBLIC_KEY_SIZE];
        hex::decode_to_slice(hex_str, &mut buff)
            .map_err(|_| anyhow::anyhow!("public key hex decode error"))?;
        PublicKey::try_from(buff.as_slice())
    }

    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        *self.0.as_bytes()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Stable identifier for access-grant bookkeeping: hex of the BLAKE3
    /// digest of the raw public key bytes.
    pub fn fingerprint(&self) -> String {
        hex::encode(blake3::hash(self.0.as_bytes()).as_bytes())
    }

    /// Encode in PEM format with the "PUBLIC KEY" tag
    pub fn to_pem(&self) -> String {
        let pem = pem::Pem::new(PUBLIC_PEM_TAG, self.to_bytes());
        pem::encode(&pem)
    }

    /// Parse a public key from PEM format
    pub fn from_pem(pem_str: &str) -> Result<Self, KeyError> {
        let pem = pem::parse(pem_str).map_err(|e| anyhow::anyhow!("failed to parse PEM: {}", e))?;
        if pem.tag() != PUBLIC_PEM_TAG {
            return Err(anyhow::anyhow!("invalid PEM tag, expected {}", PUBLIC_PEM_TAG).into());
        }
        PublicKey::try_from(pem.contents())
    }

    /// Verify an Ed25519 signature over a message
    pub fn verify(
        &self,
        msg: &[u8],
        signature: &ed25519_dalek::Signature,
    ) -> Result<(), ed25519_dalek::SignatureError> {
        self.0.verify_strict(msg, signature)
    }

    /// Convert to X25519 (Montgomery curve) for ECDH key sharing
    pub(crate) fn to_x25519(&self) -> X25519PublicKey {
        X25519PublicKey::from(self.0.to_montgomery().to_bytes())
    }
}

/// Secret half of an Ed25519 keypair.
///
/// Arrives from the escrow layer as a PEM string and is held in memory for
/// the life of a client or mount. Never persisted by the engine.
#[derive(Debug, Clone)]
pub struct SecretKey(SigningKey);

impl From<[u8; PRIVATE_KEY_SIZE]> for SecretKey {
    fn from(secret: [u8; PRIVATE_KEY_SIZE]) -> Self {
        Self(SigningKey::from_bytes(&secret))
    }
}

impl SecretKey {
    /// Generate a new random secret key using a cryptographically secure RNG
    pub fn generate() -> Self {
        let mut bytes = [0u8; PRIVATE_KEY_SIZE];
        getrandom::getrandom(&mut bytes).expect("failed to generate random bytes");
        Self::from(bytes)
    }

    /// Parse a secret key from a hexadecimal string
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let hex_str = hex_str.strip_prefix("0x").unwrap_or(hex_str);
        let mut buff = [0; PRIVATE_KEY_SIZE];
        hex::decode_to_slice(hex_str, &mut buff)
            .map_err(|_| anyhow::anyhow!("private key hex decode error"))?;
        Ok(Self::from(buff))
    }

    pub fn public(&self) -> PublicKey {
        PublicKey(self.0.verifying_key())
    }

    pub fn to_bytes(&self) -> [u8; PRIVATE_KEY_SIZE] {
        self.0.to_bytes()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Encode in PEM format with the "PRIVATE KEY" tag
    pub fn to_pem(&self) -> String {
        let pem = pem::Pem::new(PRIVATE_PEM_TAG, self.to_bytes());
        pem::encode(&pem)
    }

    /// Parse a secret key from PEM format
    ///
    /// # Errors
    ///
    /// Returns an error if the PEM is malformed, carries the wrong tag, or
    /// holds a key of the wrong size.
    pub fn from_pem(pem_str: &str) -> Result<Self, KeyError> {
        let pem = pem::parse(pem_str).map_err(|e| anyhow::anyhow!("failed to parse PEM: {}", e))?;

        if pem.tag() != PRIVATE_PEM_TAG {
            return Err(anyhow::anyhow!("invalid PEM tag, expected {}", PRIVATE_PEM_TAG).into());
        }

        let contents = pem.contents();
        if contents.len() != PRIVATE_KEY_SIZE {
            return Err(anyhow::anyhow!(
                "invalid private key size in PEM, expected {}, got {}",
                PRIVATE_KEY_SIZE,
                contents.len()
            )
            .into());
        }

        let mut bytes = [0u8; PRIVATE_KEY_SIZE];
        bytes.copy_from_slice(contents);
        Ok(Self::from(bytes))
    }

    /// Sign a message with this key
    pub fn sign(&self, msg: &[u8]) -> ed25519_dalek::Signature {
        self.0.sign(msg)
    }

    /// Convert to X25519 for ECDH key sharing
    pub(crate) fn to_x25519(&self) -> StaticSecret {
        StaticSecret::from(self.0.to_scalar_bytes())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_keypair_hex_roundtrip() {
        let private_key = SecretKey::generate();
        let public_key = private_key.public();

        let recovered_private = SecretKey::from_hex(&private_key.to_hex()).unwrap();
        assert_eq!(private_key.to_bytes(), recovered_private.to_bytes());

        let recovered_public = PublicKey::from_hex(&public_key.to_hex()).unwrap();
        assert_eq!(public_key, recovered_public);
    }

    #[test]
    fn test_pem_roundtrip() {
        let private_key = SecretKey::generate();
        let pem = private_key.to_pem();
        let recovered = SecretKey::from_pem(&pem).unwrap();
        assert_eq!(private_key.to_bytes(), recovered.to_bytes());
        assert_eq!(private_key.public(), recovered.public());

        let public_pem = private_key.public().to_pem();
        let recovered_public = PublicKey::from_pem(&public_pem).unwrap();
        assert_eq!(private_key.public(), recovered_public);
    }

    #[test]
    fn test_pem_rejects_wrong_tag() {
        let private_key = SecretKey::generate();
        // feed a public PEM where a private one is expected
        assert!(SecretKey::from_pem(&private_key.public().to_pem()).is_err());
        assert!(PublicKey::from_pem(&private_key.to_pem()).is_err());
    }

    #[test]
    fn test_sign_and_verify() {
        let secret_key = SecretKey::generate();
        let public_key = secret_key.public();
        let message = b"bucket version push";

        let signature = secret_key.sign(message);
        assert!(public_key.verify(message, &signature).is_ok());
        assert!(public_key.verify(b"tampered", &signature).is_err());
        assert!(SecretKey::generate()
            .public()
            .verify(message, &signature)
            .is_err());
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let key = SecretKey::generate().public();
        assert_eq!(key.fingerprint(), key.fingerprint());
        assert_ne!(key.fingerprint(), SecretKey::generate().public().fingerprint());
    }
}
