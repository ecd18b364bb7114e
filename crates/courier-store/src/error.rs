//! Error types for store operations.

use courier_protocol::AccountId;
use thiserror::Error;

use crate::message::MessageId;

/// Errors that can occur during store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No conversation exists with the given peer.
    #[error("No conversation with peer {0}")]
    ConversationNotFound(AccountId),

    /// A pagination cursor referenced a message that is not stored.
    #[error("Unknown cursor message {0}")]
    CursorNotFound(MessageId),

    /// A query was malformed.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A message was addressed to a conversation the local identity is not
    /// part of.
    #[error("Message does not involve the local identity")]
    NotAParticipant,
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
