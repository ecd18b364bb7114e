//! The signed, encrypted wire envelope.
//!
//! An [`Envelope`] is the only object that crosses the relay. Binary fields
//! travel base64-encoded inside a JSON [`WireEnvelope`]; parsing into an
//! [`Envelope`] is the single strict validation step, and any shape
//! mismatch rejects the whole envelope. Code past that boundary never sees
//! an unvalidated field.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};

use courier_crypto::{
    AeadNonce, Ed25519Signature, X25519PublicKey, NONCE_SIZE, SIGNATURE_SIZE, X25519_KEY_SIZE,
};

use crate::error::{ProtocolError, Result};
use crate::limits::MAX_CIPHERTEXT_LEN;

/// A numeric account identity issued by the external directory.
///
/// Always positive; zero is rejected at every ingress point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(u64);

impl AccountId {
    /// Create an account id, rejecting zero.
    pub fn new(id: u64) -> Result<Self> {
        if id == 0 {
            return Err(ProtocolError::InvalidEnvelope(
                "account id must be positive".into(),
            ));
        }
        Ok(Self(id))
    }

    /// Get the raw numeric id.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The JSON shape of an envelope on the wire.
///
/// Field names match the relay's JSON contract. This type is deliberately
/// loose (strings and integers); [`Envelope::from_wire`] performs all
/// validation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WireEnvelope {
    /// Base64 ciphertext, AEAD tag included.
    pub ciphertext: String,
    /// Base64 12-byte nonce.
    pub nonce: String,
    /// Base64 32-byte ephemeral X25519 public key.
    pub ephemeral_public_key: String,
    /// Sender account id.
    pub sender_id: u64,
    /// Recipient account id.
    pub recipient_id: u64,
    /// Creation time, epoch milliseconds.
    pub timestamp: u64,
    /// Base64 64-byte Ed25519 signature.
    pub signature: String,
}

/// A validated envelope.
///
/// Invariant: the signature MUST verify against the sender's current active
/// signing key before decryption is attempted. Validation here covers shape
/// only; signature verification is the caller's next step.
#[derive(Clone, Debug)]
pub struct Envelope {
    /// Ciphertext with AEAD tag appended.
    pub ciphertext: Vec<u8>,
    /// AEAD nonce.
    pub nonce: AeadNonce,
    /// Ephemeral X25519 public key, the only public artifact of the
    /// per-message key exchange.
    pub ephemeral_public_key: X25519PublicKey,
    /// Sender identity.
    pub sender_id: AccountId,
    /// Recipient identity.
    pub recipient_id: AccountId,
    /// Creation time, epoch milliseconds.
    pub timestamp: u64,
    /// Ed25519 signature over the canonical signing payload.
    pub signature: Ed25519Signature,
}

impl Envelope {
    /// Validate a wire envelope into a typed one.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::InvalidEnvelope` on any shape mismatch:
    /// bad base64, wrong field sizes, zero account ids, oversized or empty
    /// ciphertext.
    pub fn from_wire(wire: &WireEnvelope) -> Result<Self> {
        let ciphertext = decode_field(&wire.ciphertext, "ciphertext")?;
        if ciphertext.len() < courier_crypto::TAG_SIZE {
            return Err(ProtocolError::InvalidEnvelope(
                "ciphertext shorter than AEAD tag".into(),
            ));
        }
        if ciphertext.len() > MAX_CIPHERTEXT_LEN {
            return Err(ProtocolError::InvalidEnvelope(format!(
                "ciphertext too large: {} bytes",
                ciphertext.len()
            )));
        }

        let nonce_bytes = decode_field(&wire.nonce, "nonce")?;
        if nonce_bytes.len() != NONCE_SIZE {
            return Err(ProtocolError::InvalidEnvelope(format!(
                "nonce must be {} bytes, got {}",
                NONCE_SIZE,
                nonce_bytes.len()
            )));
        }
        let nonce = AeadNonce::from_bytes(&nonce_bytes)?;

        let ephemeral_bytes = decode_field(&wire.ephemeral_public_key, "ephemeralPublicKey")?;
        if ephemeral_bytes.len() != X25519_KEY_SIZE {
            return Err(ProtocolError::InvalidEnvelope(format!(
                "ephemeral key must be {} bytes, got {}",
                X25519_KEY_SIZE,
                ephemeral_bytes.len()
            )));
        }
        let ephemeral_public_key = X25519PublicKey::from_bytes(&ephemeral_bytes)?;

        let signature_bytes = decode_field(&wire.signature, "signature")?;
        if signature_bytes.len() != SIGNATURE_SIZE {
            return Err(ProtocolError::InvalidEnvelope(format!(
                "signature must be {} bytes, got {}",
                SIGNATURE_SIZE,
                signature_bytes.len()
            )));
        }
        let signature = Ed25519Signature::from_bytes(&signature_bytes)?;

        let sender_id = AccountId::new(wire.sender_id)?;
        let recipient_id = AccountId::new(wire.recipient_id)?;
        if sender_id == recipient_id {
            return Err(ProtocolError::InvalidEnvelope(
                "sender and recipient must differ".into(),
            ));
        }

        Ok(Self {
            ciphertext,
            nonce,
            ephemeral_public_key,
            sender_id,
            recipient_id,
            timestamp: wire.timestamp,
            signature,
        })
    }

    /// Encode for transport.
    pub fn to_wire(&self) -> WireEnvelope {
        WireEnvelope {
            ciphertext: BASE64.encode(&self.ciphertext),
            nonce: BASE64.encode(self.nonce.as_bytes()),
            ephemeral_public_key: BASE64.encode(self.ephemeral_public_key.as_bytes()),
            sender_id: self.sender_id.get(),
            recipient_id: self.recipient_id.get(),
            timestamp: self.timestamp,
            signature: BASE64.encode(self.signature.as_bytes()),
        }
    }
}

fn decode_field(value: &str, field: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(value)
        .map_err(|_| ProtocolError::InvalidEnvelope(format!("field '{}' is not valid base64", field)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_crypto::{SigningKeyPair, X25519StaticPrivateKey};

    fn sample_envelope() -> Envelope {
        let recipient_static = X25519StaticPrivateKey::generate();
        let signing = SigningKeyPair::generate();
        let sealed =
            crate::encryption::encrypt_for_recipient(b"hi", &recipient_static.public_key())
                .unwrap();

        Envelope {
            ciphertext: sealed.ciphertext,
            nonce: sealed.nonce,
            ephemeral_public_key: sealed.ephemeral_public_key,
            sender_id: AccountId::new(7).unwrap(),
            recipient_id: AccountId::new(12).unwrap(),
            timestamp: 1_700_000_000_000,
            signature: signing.sign(b"placeholder"),
        }
    }

    #[test]
    fn test_account_id_rejects_zero() {
        assert!(AccountId::new(0).is_err());
        assert!(AccountId::new(1).is_ok());
    }

    #[test]
    fn test_wire_roundtrip() {
        let envelope = sample_envelope();
        let wire = envelope.to_wire();
        let restored = Envelope::from_wire(&wire).unwrap();

        assert_eq!(restored.ciphertext, envelope.ciphertext);
        assert_eq!(restored.nonce, envelope.nonce);
        assert_eq!(
            restored.ephemeral_public_key.as_bytes(),
            envelope.ephemeral_public_key.as_bytes()
        );
        assert_eq!(restored.sender_id, envelope.sender_id);
        assert_eq!(restored.recipient_id, envelope.recipient_id);
        assert_eq!(restored.timestamp, envelope.timestamp);
        assert_eq!(restored.signature, envelope.signature);
    }

    #[test]
    fn test_wire_json_uses_camel_case() {
        let wire = sample_envelope().to_wire();
        let json = serde_json::to_string(&wire).unwrap();

        assert!(json.contains("\"ephemeralPublicKey\""));
        assert!(json.contains("\"senderId\""));
        assert!(json.contains("\"recipientId\""));
    }

    #[test]
    fn test_rejects_bad_base64() {
        let mut wire = sample_envelope().to_wire();
        wire.ciphertext = "not base64 !!!".into();
        assert!(Envelope::from_wire(&wire).is_err());
    }

    #[test]
    fn test_rejects_wrong_nonce_size() {
        let mut wire = sample_envelope().to_wire();
        wire.nonce = BASE64.encode([0u8; 24]);
        assert!(Envelope::from_wire(&wire).is_err());
    }

    #[test]
    fn test_rejects_wrong_ephemeral_size() {
        let mut wire = sample_envelope().to_wire();
        wire.ephemeral_public_key = BASE64.encode([0u8; 16]);
        assert!(Envelope::from_wire(&wire).is_err());
    }

    #[test]
    fn test_rejects_wrong_signature_size() {
        let mut wire = sample_envelope().to_wire();
        wire.signature = BASE64.encode([0u8; 32]);
        assert!(Envelope::from_wire(&wire).is_err());
    }

    #[test]
    fn test_rejects_zero_ids() {
        let mut wire = sample_envelope().to_wire();
        wire.sender_id = 0;
        assert!(Envelope::from_wire(&wire).is_err());

        let mut wire = sample_envelope().to_wire();
        wire.recipient_id = 0;
        assert!(Envelope::from_wire(&wire).is_err());
    }

    #[test]
    fn test_rejects_self_addressed() {
        let mut wire = sample_envelope().to_wire();
        wire.recipient_id = wire.sender_id;
        assert!(Envelope::from_wire(&wire).is_err());
    }

    #[test]
    fn test_rejects_truncated_ciphertext() {
        let mut wire = sample_envelope().to_wire();
        wire.ciphertext = BASE64.encode([0u8; 4]);
        assert!(Envelope::from_wire(&wire).is_err());
    }

    #[test]
    fn test_rejects_oversized_ciphertext() {
        let mut wire = sample_envelope().to_wire();
        wire.ciphertext = BASE64.encode(vec![0u8; MAX_CIPHERTEXT_LEN + 1]);
        assert!(Envelope::from_wire(&wire).is_err());
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let wire = sample_envelope().to_wire();
        let mut value = serde_json::to_value(&wire).unwrap();
        value
            .as_object_mut()
            .unwrap()
            .insert("extra".into(), serde_json::json!(true));

        let parsed: std::result::Result<WireEnvelope, _> = serde_json::from_value(value);
        assert!(parsed.is_err());
    }
}
