//! Stored message and conversation types.

use std::fmt;

use courier_crypto::Ed25519Signature;
use courier_protocol::AccountId;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Unique message identifier: 16 random bytes, hex display.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId([u8; 16]);

impl MessageId {
    /// Generate a new random id.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Parse from a 32-character hex string.
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let arr: [u8; 16] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    /// Format as lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId({})", self.to_hex())
    }
}

/// Canonical identifier for a two-party conversation.
///
/// Built from the sorted participant pair, so both parties compute the same
/// id regardless of who initiated.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationId {
    lo: AccountId,
    hi: AccountId,
}

impl ConversationId {
    /// Compute the canonical id for a participant pair.
    pub fn new(a: AccountId, b: AccountId) -> Self {
        if a <= b {
            Self { lo: a, hi: b }
        } else {
            Self { lo: b, hi: a }
        }
    }

    /// Both participants, in canonical order.
    pub fn participants(&self) -> [AccountId; 2] {
        [self.lo, self.hi]
    }

    /// The participant that is not `local`, if `local` is a participant.
    pub fn peer_of(&self, local: AccountId) -> Option<AccountId> {
        if self.lo == local {
            Some(self.hi)
        } else if self.hi == local {
            Some(self.lo)
        } else {
            None
        }
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.lo, self.hi)
    }
}

impl fmt::Debug for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConversationId({}:{})", self.lo, self.hi)
    }
}

/// A decrypted message at rest.
///
/// Immutable once stored, except for the `is_read` flag which
/// `mark_read` flips in place.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlaintextMessage {
    /// Unique id.
    pub id: MessageId,
    /// Conversation this message belongs to.
    pub conversation_id: ConversationId,
    /// Author.
    pub sender_id: AccountId,
    /// Addressee.
    pub recipient_id: AccountId,
    /// Decrypted message text.
    pub text: String,
    /// Embed URLs attached to the message.
    pub embeds: Vec<String>,
    /// Message this one replies to, if any.
    pub reply_to: Option<MessageId>,
    /// Creation time, epoch milliseconds.
    pub timestamp: u64,
    /// The envelope signature, kept for audit.
    pub signature: Ed25519Signature,
    /// Whether the local user has read this message. Outbound messages are
    /// stored read; inbound start unread.
    pub is_read: bool,
}

/// A two-party conversation and its denormalized state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Conversation {
    /// Canonical id.
    pub id: ConversationId,
    /// Both participants, canonical order.
    pub participants: [AccountId; 2],
    /// Most recently appended message.
    pub last_message: Option<PlaintextMessage>,
    /// Inbound messages not yet marked read.
    pub unread_count: u64,
    /// Creation time, epoch milliseconds.
    pub created_at: u64,
    /// Time of the last append, epoch milliseconds.
    pub updated_at: u64,
    /// Hidden from the default conversation list.
    pub is_archived: bool,
    /// Notifications suppressed.
    pub is_muted: bool,
}
