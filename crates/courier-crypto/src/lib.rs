//! # courier-crypto
//!
//! Cryptographic primitives for the Courier direct-messaging engine.
//!
//! This crate provides:
//! - **Ed25519** for sender authentication signatures
//! - **X25519** for per-message ephemeral key exchange
//! - **HKDF-SHA256** for key derivation
//! - **AES-256-GCM** for authenticated symmetric encryption
//!
//! ## Security
//!
//! All secret data uses `zeroize` for secure memory cleanup. Private key
//! material is never exposed through `Debug` output.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aead;
pub mod derive;
pub mod error;
pub mod kdf;
pub mod signing;
pub mod x25519;

pub use aead::{open, seal, AeadKey, AeadNonce, KEY_SIZE, NONCE_SIZE, TAG_SIZE};
pub use derive::{derive_encryption_keypair, EncryptionKeyPair};
pub use error::{CryptoError, Result};
pub use kdf::hkdf_sha256;
pub use signing::{
    Ed25519PublicKey, Ed25519Signature, SigningKeyPair, SIGNATURE_SIZE, SIGNING_KEY_SIZE,
};
pub use x25519::{
    SharedSecret, X25519EphemeralKeyPair, X25519PublicKey, X25519StaticPrivateKey,
    X25519_KEY_SIZE,
};
