//! Ed25519 signing keys and signatures.
//!
//! Every Courier identity has at most one active signing key, registered
//! with the external identity directory. Envelopes are signed with the
//! sender's key and verified against the directory-resolved public key.
//!
//! ## Security Notes
//!
//! - Signing private keys are zeroized on drop
//! - `Debug` output never exposes private key material

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::{CryptoError, Result};

/// Size of an Ed25519 private key seed in bytes.
pub const SIGNING_KEY_SIZE: usize = 32;

/// Size of an Ed25519 public key in bytes.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Size of an Ed25519 signature in bytes.
pub const SIGNATURE_SIZE: usize = 64;

/// An Ed25519 signing keypair.
///
/// Holds the private half; the public half is obtained via
/// [`SigningKeyPair::public_key`] and published to the directory.
pub struct SigningKeyPair {
    key: SigningKey,
}

impl SigningKeyPair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        Self {
            key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Create from a 32-byte private key seed.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SIGNING_KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: SIGNING_KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut seed = [0u8; SIGNING_KEY_SIZE];
        seed.copy_from_slice(bytes);
        let key = SigningKey::from_bytes(&seed);
        Ok(Self { key })
    }

    /// Get the raw private key seed.
    ///
    /// # Security
    ///
    /// The returned buffer is zeroized on drop. This is the input keying
    /// material for the identity-key deriver; never persist or transmit it.
    pub fn seed(&self) -> Zeroizing<[u8; SIGNING_KEY_SIZE]> {
        Zeroizing::new(self.key.to_bytes())
    }

    /// Get the corresponding public key.
    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey {
            bytes: self.key.verifying_key().to_bytes(),
        }
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        let sig = self.key.sign(message);
        Ed25519Signature {
            bytes: sig.to_bytes(),
        }
    }
}

impl std::fmt::Debug for SigningKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SigningKeyPair([REDACTED])")
    }
}

/// An Ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ed25519PublicKey {
    bytes: [u8; PUBLIC_KEY_SIZE],
}

impl Ed25519PublicKey {
    /// Create from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are the wrong length or do not encode
    /// a valid curve point.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PUBLIC_KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: PUBLIC_KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; PUBLIC_KEY_SIZE];
        arr.copy_from_slice(bytes);
        // Validate at ingress so later verification cannot panic.
        VerifyingKey::from_bytes(&arr).map_err(|_| CryptoError::InvalidSignature)?;
        Ok(Self { bytes: arr })
    }

    /// Get the key as bytes.
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.bytes
    }

    /// Format as a hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Verify a signature over a message.
    ///
    /// Returns `true` only if the signature was produced by the matching
    /// private key over exactly this message.
    pub fn verify(&self, message: &[u8], signature: &Ed25519Signature) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(&self.bytes) else {
            return false;
        };
        let sig = Signature::from_bytes(&signature.bytes);
        key.verify(message, &sig).is_ok()
    }
}

impl std::fmt::Debug for Ed25519PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Ed25519PublicKey({:02x}{:02x}..)",
            self.bytes[0], self.bytes[1]
        )
    }
}

/// An Ed25519 signature (64 bytes).
///
/// Serializes as a hex string; 64-byte arrays have no serde derive support.
#[derive(Clone, PartialEq, Eq)]
pub struct Ed25519Signature {
    bytes: [u8; SIGNATURE_SIZE],
}

impl Serialize for Ed25519Signature {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.bytes))
    }
}

impl<'de> Deserialize<'de> for Ed25519Signature {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let hex_str = String::deserialize(deserializer)?;
        let bytes = hex::decode(&hex_str).map_err(serde::de::Error::custom)?;
        Self::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

impl Ed25519Signature {
    /// Create from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SIGNATURE_SIZE {
            return Err(CryptoError::InvalidSignature);
        }
        let mut arr = [0u8; SIGNATURE_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// Get the signature as bytes.
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.bytes
    }

    /// Convert to owned byte array.
    pub fn to_bytes(&self) -> [u8; SIGNATURE_SIZE] {
        self.bytes
    }
}

impl std::fmt::Debug for Ed25519Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let short_hex: String = self.bytes[..8].iter().map(|b| format!("{:02x}", b)).collect();
        write!(f, "Ed25519Signature({}...)", short_hex)
    }
}
