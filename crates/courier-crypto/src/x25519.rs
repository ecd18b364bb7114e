//! X25519 Diffie-Hellman key exchange.
//!
//! Provides elliptic curve Diffie-Hellman key exchange using Curve25519.
//! Each outgoing message uses a fresh ephemeral keypair against the
//! recipient's long-lived static key.
//!
//! ## Security Notes
//!
//! - Private keys are zeroized on drop
//! - Uses OsRng for key generation
//! - Shared secrets are zeroized after use
//! - Ephemeral private keys are consumed by the exchange and cannot be reused

use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{CryptoError, Result};

/// Size of X25519 public and private keys in bytes.
pub const X25519_KEY_SIZE: usize = 32;

/// Size of the raw shared secret in bytes.
pub const SHARED_SECRET_SIZE: usize = 32;

/// X25519 public key for key exchange.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct X25519PublicKey {
    bytes: [u8; X25519_KEY_SIZE],
}

impl X25519PublicKey {
    /// Create from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != X25519_KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: X25519_KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; X25519_KEY_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// Get the key as bytes.
    pub fn as_bytes(&self) -> &[u8; X25519_KEY_SIZE] {
        &self.bytes
    }

    /// Convert to byte array.
    pub fn to_bytes(&self) -> [u8; X25519_KEY_SIZE] {
        self.bytes
    }
}

impl std::fmt::Debug for X25519PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "X25519PublicKey({:02x}{:02x}..)",
            self.bytes[0], self.bytes[1]
        )
    }
}

impl From<PublicKey> for X25519PublicKey {
    fn from(key: PublicKey) -> Self {
        Self {
            bytes: key.to_bytes(),
        }
    }
}

impl From<&X25519PublicKey> for PublicKey {
    fn from(key: &X25519PublicKey) -> Self {
        PublicKey::from(key.bytes)
    }
}

/// X25519 static private key for key exchange.
///
/// This is the long-lived half of an identity's encryption keypair,
/// derived once per engine session. It lives only in process memory and is
/// never persisted or transmitted.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct X25519StaticPrivateKey {
    bytes: [u8; X25519_KEY_SIZE],
}

impl X25519StaticPrivateKey {
    /// Generate a new random private key.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        Self {
            bytes: secret.to_bytes(),
        }
    }

    /// Create from raw bytes.
    ///
    /// # Security
    ///
    /// Only use bytes from a secure source (OS randomness or a KDF).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != X25519_KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: X25519_KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; X25519_KEY_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// Get the corresponding public key.
    pub fn public_key(&self) -> X25519PublicKey {
        let secret = StaticSecret::from(self.bytes);
        let public = PublicKey::from(&secret);
        X25519PublicKey::from(public)
    }

    /// Perform Diffie-Hellman key exchange with a peer's public key.
    pub fn diffie_hellman(&self, peer_public: &X25519PublicKey) -> SharedSecret {
        let secret = StaticSecret::from(self.bytes);
        let peer = PublicKey::from(peer_public);
        let shared = secret.diffie_hellman(&peer);
        SharedSecret {
            bytes: shared.to_bytes(),
        }
    }
}

impl std::fmt::Debug for X25519StaticPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "X25519StaticPrivateKey([REDACTED])")
    }
}

// Clone intentionally NOT implemented for X25519StaticPrivateKey: secret
// material must not be silently duplicated in memory.

/// X25519 ephemeral keypair for single-use key exchange.
///
/// Generated fresh for every outgoing message. The private half is consumed
/// by [`X25519EphemeralKeyPair::diffie_hellman`] and destroyed immediately
/// after deriving the shared secret.
pub struct X25519EphemeralKeyPair {
    secret: EphemeralSecret,
    public: X25519PublicKey,
}

impl X25519EphemeralKeyPair {
    /// Generate a new ephemeral keypair.
    pub fn generate() -> Self {
        let secret = EphemeralSecret::random_from_rng(OsRng);
        let public_key = PublicKey::from(&secret);
        Self {
            secret,
            public: X25519PublicKey::from(public_key),
        }
    }

    /// Get the public key.
    pub fn public_key(&self) -> &X25519PublicKey {
        &self.public
    }

    /// Perform Diffie-Hellman and consume the ephemeral key.
    ///
    /// The private key is destroyed after this operation.
    pub fn diffie_hellman(self, peer_public: &X25519PublicKey) -> SharedSecret {
        let peer = PublicKey::from(peer_public);
        let shared = self.secret.diffie_hellman(&peer);
        SharedSecret {
            bytes: shared.to_bytes(),
        }
    }
}

impl std::fmt::Debug for X25519EphemeralKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "X25519EphemeralKeyPair {{ public: {:?} }}", self.public)
    }
}

/// Shared secret derived from Diffie-Hellman key exchange.
///
/// This should be fed to HKDF, not used directly as an encryption key.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret {
    bytes: [u8; SHARED_SECRET_SIZE],
}

impl SharedSecret {
    /// Get the shared secret as bytes.
    ///
    /// # Security
    ///
    /// Use this to derive actual encryption keys via HKDF.
    /// Don't use directly as an encryption key.
    pub fn as_bytes(&self) -> &[u8; SHARED_SECRET_SIZE] {
        &self.bytes
    }

    /// Derive a 32-byte encryption key using HKDF-SHA256 with a context
    /// string.
    pub fn derive_key(&self, info: &str) -> [u8; 32] {
        crate::kdf::hkdf_sha256(&self.bytes, &[], info.as_bytes())
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SharedSecret([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_key_generation() {
        let key = X25519StaticPrivateKey::generate();
        let public = key.public_key();

        assert_eq!(public.as_bytes().len(), X25519_KEY_SIZE);
    }

    #[test]
    fn test_static_key_exchange() {
        let alice_private = X25519StaticPrivateKey::generate();
        let alice_public = alice_private.public_key();

        let bob_private = X25519StaticPrivateKey::generate();
        let bob_public = bob_private.public_key();

        // Both parties derive the same shared secret
        let alice_shared = alice_private.diffie_hellman(&bob_public);
        let bob_shared = bob_private.diffie_hellman(&alice_public);

        assert_eq!(alice_shared.as_bytes(), bob_shared.as_bytes());
    }

    #[test]
    fn test_ephemeral_static_exchange() {
        // The message-encryption shape: ephemeral sender key against the
        // recipient's static key.
        let recipient = X25519StaticPrivateKey::generate();
        let recipient_public = recipient.public_key();

        let ephemeral = X25519EphemeralKeyPair::generate();
        let ephemeral_public = ephemeral.public_key().clone();

        let sender_shared = ephemeral.diffie_hellman(&recipient_public);
        let recipient_shared = recipient.diffie_hellman(&ephemeral_public);

        assert_eq!(sender_shared.as_bytes(), recipient_shared.as_bytes());
    }

    #[test]
    fn test_different_keys_produce_different_secrets() {
        let alice = X25519StaticPrivateKey::generate();
        let bob = X25519StaticPrivateKey::generate();
        let carol = X25519StaticPrivateKey::generate();

        let shared_ab = alice.diffie_hellman(&bob.public_key());
        let shared_ac = alice.diffie_hellman(&carol.public_key());

        assert_ne!(shared_ab.as_bytes(), shared_ac.as_bytes());
    }

    #[test]
    fn test_key_derivation_contexts_differ() {
        let alice = X25519StaticPrivateKey::generate();
        let bob = X25519StaticPrivateKey::generate();

        let shared = alice.diffie_hellman(&bob.public_key());

        let aead_key = shared.derive_key("direct-message-aead");
        let other_key = shared.derive_key("some-other-context");

        assert_ne!(aead_key, other_key);
    }

    #[test]
    fn test_public_key_serialization() {
        let private = X25519StaticPrivateKey::generate();
        let public = private.public_key();

        let bytes = public.to_bytes();
        let restored = X25519PublicKey::from_bytes(&bytes).unwrap();

        assert_eq!(public, restored);
    }

    #[test]
    fn test_invalid_key_length() {
        let short = [0u8; 16];
        assert!(X25519PublicKey::from_bytes(&short).is_err());
        assert!(X25519StaticPrivateKey::from_bytes(&short).is_err());
    }

    #[test]
    fn test_debug_redacted() {
        let private = X25519StaticPrivateKey::generate();
        let shared = SharedSecret {
            bytes: [0u8; SHARED_SECRET_SIZE],
        };

        assert!(format!("{:?}", private).contains("REDACTED"));
        assert!(format!("{:?}", shared).contains("REDACTED"));
    }

    #[test]
    fn test_public_key_debug_not_redacted() {
        let private = X25519StaticPrivateKey::generate();
        let public = private.public_key();
        let debug = format!("{:?}", public);

        assert!(debug.contains("X25519PublicKey"));
        assert!(!debug.contains("REDACTED"));
    }
}
