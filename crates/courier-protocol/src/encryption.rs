//! Per-message encryption pipeline.
//!
//! Every outgoing message uses a fresh ephemeral X25519 keypair against the
//! recipient's static encryption key. The shared secret is expanded through
//! HKDF-SHA256 with a fixed context string into a single-use AES-256-GCM key.
//! The ephemeral private key is consumed by the exchange, so the sender
//! cannot re-derive the message key afterwards.

use courier_crypto::{
    open, seal, AeadKey, AeadNonce, X25519EphemeralKeyPair, X25519PublicKey,
    X25519StaticPrivateKey,
};

use crate::error::{ProtocolError, Result};

/// HKDF context string for the per-message AEAD key.
///
/// Changing this value breaks decryption of all prior traffic. It binds the
/// derived key to this use so a shared secret leaked from another protocol
/// layer cannot decrypt messages.
pub const AEAD_KDF_INFO: &str = "direct-message-aead";

/// The output of encrypting one message: everything the recipient needs
/// besides their own static private key.
#[derive(Clone, Debug)]
pub struct SealedMessage {
    /// Ciphertext with the AEAD tag appended.
    pub ciphertext: Vec<u8>,
    /// Nonce used for this message.
    pub nonce: AeadNonce,
    /// Ephemeral public key for the recipient's half of the exchange.
    pub ephemeral_public_key: X25519PublicKey,
}

/// Encrypt a plaintext for a recipient's static encryption key.
///
/// 1. Generate a fresh ephemeral X25519 keypair
/// 2. Diffie-Hellman against the recipient's static public key
/// 3. Derive the AEAD key via HKDF-SHA256 with [`AEAD_KDF_INFO`]
/// 4. Seal under a random 96-bit nonce
///
/// # Errors
///
/// Returns an error only if the underlying cipher rejects the input.
pub fn encrypt_for_recipient(
    plaintext: &[u8],
    recipient_public: &X25519PublicKey,
) -> Result<SealedMessage> {
    let ephemeral = X25519EphemeralKeyPair::generate();
    let ephemeral_public_key = ephemeral.public_key().clone();

    let shared = ephemeral.diffie_hellman(recipient_public);
    let key = AeadKey::from_bytes(&shared.derive_key(AEAD_KDF_INFO))?;

    let nonce = AeadNonce::generate();
    let ciphertext = seal(&key, &nonce, plaintext)?;

    Ok(SealedMessage {
        ciphertext,
        nonce,
        ephemeral_public_key,
    })
}

/// Decrypt a sealed message as the recipient.
///
/// Fail-closed: any tampering with the ciphertext, nonce, or ephemeral key
/// yields `ProtocolError::DecryptionFailed` with no partial output. A
/// payload that decrypts but is not valid UTF-8 is rejected as
/// `ProtocolError::InvalidPlaintext`.
pub fn decrypt_as_recipient(
    sealed: &SealedMessage,
    recipient_private: &X25519StaticPrivateKey,
) -> Result<String> {
    let shared = recipient_private.diffie_hellman(&sealed.ephemeral_public_key);
    let key = AeadKey::from_bytes(&shared.derive_key(AEAD_KDF_INFO))?;

    let plaintext = open(&key, &sealed.nonce, &sealed.ciphertext)
        .map_err(|_| ProtocolError::DecryptionFailed)?;

    String::from_utf8(plaintext).map_err(|_| ProtocolError::InvalidPlaintext)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn roundtrip_arbitrary_text(text in "\\PC{1,512}") {
            let recipient = X25519StaticPrivateKey::generate();

            let sealed = encrypt_for_recipient(text.as_bytes(), &recipient.public_key()).unwrap();
            let plaintext = decrypt_as_recipient(&sealed, &recipient).unwrap();

            prop_assert_eq!(plaintext, text);
        }

        #[test]
        fn single_bit_flip_in_ciphertext_rejected(
            text in "\\PC{1,128}",
            flip_bit in any::<usize>()
        ) {
            let recipient = X25519StaticPrivateKey::generate();
            let mut sealed =
                encrypt_for_recipient(text.as_bytes(), &recipient.public_key()).unwrap();

            let bit = flip_bit % (sealed.ciphertext.len() * 8);
            sealed.ciphertext[bit / 8] ^= 1 << (bit % 8);

            prop_assert!(decrypt_as_recipient(&sealed, &recipient).is_err());
        }
    }
}
