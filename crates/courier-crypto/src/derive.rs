//! Identity encryption-key derivation.
//!
//! Derives an identity's static X25519 encryption keypair from its Ed25519
//! signing private key via HKDF-SHA256. The derivation is deterministic:
//! the same signing key always yields the same encryption pair, so the pair
//! never needs to be stored.
//!
//! The encryption **public** key is not derivable by third parties from the
//! signing public key alone; the identity must actively publish it to the
//! directory before peers can address it.

use crate::kdf::hkdf_sha256;
use crate::signing::SigningKeyPair;
use crate::x25519::{X25519PublicKey, X25519StaticPrivateKey};
use crate::Result;

/// Protocol context for the static encryption-key derivation.
const STATIC_KEY_CONTEXT: &[u8] = b"courier/static-encryption-key/v1";

/// An identity's static X25519 encryption keypair.
///
/// Created once at engine initialization and held for the session. The
/// private half lives only in process memory; it is never persisted or
/// transmitted.
pub struct EncryptionKeyPair {
    private: X25519StaticPrivateKey,
    public: X25519PublicKey,
}

impl EncryptionKeyPair {
    /// Get the private key.
    pub fn private_key(&self) -> &X25519StaticPrivateKey {
        &self.private
    }

    /// Get the public key.
    pub fn public_key(&self) -> &X25519PublicKey {
        &self.public
    }
}

impl std::fmt::Debug for EncryptionKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

/// Derive the static encryption keypair from a signing keypair.
///
/// Runs HKDF-SHA256 over the signing private key bytes with an empty salt
/// and a fixed protocol context, and uses the 32-byte output as an X25519
/// private key.
pub fn derive_encryption_keypair(signing: &SigningKeyPair) -> Result<EncryptionKeyPair> {
    let seed = signing.seed();
    let okm = hkdf_sha256(seed.as_ref(), &[], STATIC_KEY_CONTEXT);

    let private = X25519StaticPrivateKey::from_bytes(&okm)?;
    let public = private.public_key();
    Ok(EncryptionKeyPair { private, public })
}
