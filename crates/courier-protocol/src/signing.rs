//! Envelope authenticity.
//!
//! Envelopes are signed over a canonical byte encoding of their addressing
//! and ciphertext so the signature binds sender, recipient, timestamp, and
//! payload together. Verification happens BEFORE decryption; an envelope
//! whose signature fails is dropped without touching the cipher.

use courier_crypto::{Ed25519PublicKey, Ed25519Signature, SigningKeyPair};

use crate::envelope::{AccountId, Envelope};

/// Domain separator for envelope signatures.
///
/// Keeps an envelope signature from being replayed as any other signed
/// object in the network (posts, key registrations, receipts).
pub const SIGNING_DOMAIN: &[u8] = b"COURIER-DM-SIG-v1";

/// The canonical byte encoding signed for each envelope.
///
/// Layout, in order:
///
/// ```text
/// SIGNING_DOMAIN
/// environment length (1 byte) || environment bytes
/// sender id     (u64 big-endian)
/// recipient id  (u64 big-endian)
/// timestamp     (u64 big-endian)
/// ciphertext    (remaining bytes)
/// ```
///
/// Every field except the ciphertext is fixed-width or length-prefixed, so
/// no two distinct inputs share an encoding. The environment string keeps
/// staging traffic from verifying in production.
#[derive(Clone, Debug)]
pub struct SigningPayload<'a> {
    /// Deployment environment tag, e.g. "production".
    pub environment: &'a str,
    /// Sender identity.
    pub sender_id: AccountId,
    /// Recipient identity.
    pub recipient_id: AccountId,
    /// Creation time, epoch milliseconds.
    pub timestamp: u64,
    /// Ciphertext with AEAD tag.
    pub ciphertext: &'a [u8],
}

impl<'a> SigningPayload<'a> {
    /// Build the payload for an envelope.
    pub fn for_envelope(envelope: &'a Envelope, environment: &'a str) -> Self {
        Self {
            environment,
            sender_id: envelope.sender_id,
            recipient_id: envelope.recipient_id,
            timestamp: envelope.timestamp,
            ciphertext: &envelope.ciphertext,
        }
    }

    /// Produce the canonical bytes to sign or verify.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let env = self.environment.as_bytes();
        // A 255-byte cap keeps the length prefix to one byte; config
        // validation rejects longer environment tags.
        let env = &env[..env.len().min(u8::MAX as usize)];

        let mut bytes =
            Vec::with_capacity(SIGNING_DOMAIN.len() + 1 + env.len() + 24 + self.ciphertext.len());
        bytes.extend_from_slice(SIGNING_DOMAIN);
        bytes.push(env.len() as u8);
        bytes.extend_from_slice(env);
        bytes.extend_from_slice(&self.sender_id.get().to_be_bytes());
        bytes.extend_from_slice(&self.recipient_id.get().to_be_bytes());
        bytes.extend_from_slice(&self.timestamp.to_be_bytes());
        bytes.extend_from_slice(self.ciphertext);
        bytes
    }
}

/// Sign an envelope's canonical payload with the sender's signing key.
pub fn sign_envelope(
    envelope: &Envelope,
    environment: &str,
    keypair: &SigningKeyPair,
) -> Ed25519Signature {
    let payload = SigningPayload::for_envelope(envelope, environment);
    keypair.sign(&payload.canonical_bytes())
}

/// Verify an envelope's signature against the sender's public key.
///
/// Returns `true` only if the embedded signature covers exactly this
/// envelope's sender, recipient, timestamp, and ciphertext in this
/// environment.
pub fn verify_envelope(
    envelope: &Envelope,
    environment: &str,
    sender_key: &Ed25519PublicKey,
) -> bool {
    let payload = SigningPayload::for_envelope(envelope, environment);
    sender_key.verify(&payload.canonical_bytes(), &envelope.signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encryption::encrypt_for_recipient;
    use courier_crypto::X25519StaticPrivateKey;

    const ENV: &str = "test";

    fn signed_envelope(keypair: &SigningKeyPair) -> Envelope {
        let recipient = X25519StaticPrivateKey::generate();
        let sealed = encrypt_for_recipient(b"signed payload", &recipient.public_key()).unwrap();

        let mut envelope = Envelope {
            ciphertext: sealed.ciphertext,
            nonce: sealed.nonce,
            ephemeral_public_key: sealed.ephemeral_public_key,
            sender_id: AccountId::new(41).unwrap(),
            recipient_id: AccountId::new(87).unwrap(),
            timestamp: 1_724_400_000_000,
            signature: keypair.sign(b"placeholder"),
        };
        envelope.signature = sign_envelope(&envelope, ENV, keypair);
        envelope
    }

    #[test]
    fn test_sign_verify_roundtrip() {
        let keypair = SigningKeyPair::generate();
        let envelope = signed_envelope(&keypair);

        assert!(verify_envelope(&envelope, ENV, &keypair.public_key()));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let keypair = SigningKeyPair::generate();
        let other = SigningKeyPair::generate();
        let envelope = signed_envelope(&keypair);

        assert!(!verify_envelope(&envelope, ENV, &other.public_key()));
    }

    #[test]
    fn test_signature_binds_sender() {
        let keypair = SigningKeyPair::generate();
        let mut envelope = signed_envelope(&keypair);
        envelope.sender_id = AccountId::new(42).unwrap();

        assert!(!verify_envelope(&envelope, ENV, &keypair.public_key()));
    }

    #[test]
    fn test_signature_binds_recipient() {
        let keypair = SigningKeyPair::generate();
        let mut envelope = signed_envelope(&keypair);
        envelope.recipient_id = AccountId::new(88).unwrap();

        assert!(!verify_envelope(&envelope, ENV, &keypair.public_key()));
    }

    #[test]
    fn test_signature_binds_timestamp() {
        let keypair = SigningKeyPair::generate();
        let mut envelope = signed_envelope(&keypair);
        envelope.timestamp += 1;

        assert!(!verify_envelope(&envelope, ENV, &keypair.public_key()));
    }

    #[test]
    fn test_signature_binds_ciphertext() {
        let keypair = SigningKeyPair::generate();
        let mut envelope = signed_envelope(&keypair);
        envelope.ciphertext[0] ^= 0x01;

        assert!(!verify_envelope(&envelope, ENV, &keypair.public_key()));
    }

    #[test]
    fn test_signature_binds_environment() {
        let keypair = SigningKeyPair::generate();
        let envelope = signed_envelope(&keypair);

        assert!(!verify_envelope(&envelope, "production", &keypair.public_key()));
    }

    #[test]
    fn test_canonical_bytes_start_with_domain() {
        let keypair = SigningKeyPair::generate();
        let envelope = signed_envelope(&keypair);
        let payload = SigningPayload::for_envelope(&envelope, ENV);

        assert!(payload.canonical_bytes().starts_with(SIGNING_DOMAIN));
    }

    #[test]
    fn test_canonical_bytes_are_deterministic() {
        let keypair = SigningKeyPair::generate();
        let envelope = signed_envelope(&keypair);
        let payload = SigningPayload::for_envelope(&envelope, ENV);

        assert_eq!(payload.canonical_bytes(), payload.canonical_bytes());
    }
}
