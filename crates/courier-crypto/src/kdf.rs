//! HKDF-SHA256 key derivation.
//!
//! Single derivation primitive shared by the identity-key deriver and the
//! per-message symmetric key derivation. Every call site supplies its own
//! `info` context string so derived keys are domain-separated.

use hkdf::Hkdf;
use sha2::Sha256;

/// Derive a 32-byte key from input keying material via HKDF-SHA256.
///
/// An empty `salt` slice is treated as the RFC 5869 default (a zeroed
/// hash-length salt).
pub fn hkdf_sha256(ikm: &[u8], salt: &[u8], info: &[u8]) -> [u8; 32] {
    let salt = if salt.is_empty() { None } else { Some(salt) };
    let hk = Hkdf::<Sha256>::new(salt, ikm);
    let mut okm = [0u8; 32];
    // 32 bytes is always a valid HKDF-SHA256 output length.
    hk.expand(info, &mut okm)
        .unwrap_or_else(|_| unreachable!("32-byte HKDF-SHA256 expand cannot fail"));
    okm
}
