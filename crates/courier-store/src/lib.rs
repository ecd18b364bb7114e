//! # courier-store
//!
//! Bounded in-memory storage for decrypted direct messages. The store is
//! the durability boundary of the engine: relay delivery is best-effort,
//! but an accepted message is always queryable locally until the caps push
//! it out.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod conversations;
pub mod error;
pub mod message;
pub mod snapshot;

pub use conversations::{
    ConversationStore, MessageQuery, DEFAULT_MAX_CONVERSATIONS, DEFAULT_MAX_MESSAGES,
    DEFAULT_PAGE_SIZE,
};
pub use error::{Result, StoreError};
pub use message::{Conversation, ConversationId, MessageId, PlaintextMessage};
pub use snapshot::{Snapshot, SnapshotEntry, SNAPSHOT_VERSION};
