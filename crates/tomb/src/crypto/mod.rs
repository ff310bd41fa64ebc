//! Cryptographic primitives for the mount engine.
//!
//! - **Identity**: Ed25519 keypairs for devices and bucket encryption keys,
//!   exchanged as PEM strings with the key-escrow layer above us
//! - **Content encryption**: per-item ChaCha20-Poly1305 secrets, so every
//!   node and file blob is independently encrypted
//! - **Key sharing**: ECDH (X25519) + AES-KW wrapping of a tree secret for
//!   another principal's public key
//!
//! The engine never sees passphrases. It receives already-derived PEM key
//! material and treats it as read-only.

mod keys;
mod secret;
mod secret_share;

pub use ed25519_dalek::Signature;
pub use keys::{KeyError, PublicKey, SecretKey, PRIVATE_KEY_SIZE, PUBLIC_KEY_SIZE};
pub use secret::{Secret, SecretError, NONCE_SIZE, SECRET_SIZE};
pub use secret_share::{SecretShare, SecretShareError, SECRET_SHARE_SIZE};
