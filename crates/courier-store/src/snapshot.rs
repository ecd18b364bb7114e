//! Snapshot format for persisted conversation state.
//!
//! A snapshot is a versioned JSON document captured at shutdown and loaded
//! at startup. Loading is forgiving: a snapshot that fails to parse or
//! carries an unknown version yields an empty store, never a startup
//! failure.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::conversations::ConversationStore;
use crate::message::{Conversation, PlaintextMessage};

/// Current snapshot schema version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// One conversation with its stored messages.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// Conversation state.
    pub conversation: Conversation,
    /// Messages in insertion order.
    pub messages: Vec<PlaintextMessage>,
}

/// A point-in-time capture of a [`ConversationStore`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Snapshot {
    /// Schema version, must equal [`SNAPSHOT_VERSION`].
    pub version: u32,
    /// All conversations.
    pub entries: Vec<SnapshotEntry>,
}

impl Snapshot {
    /// Capture the current store state.
    pub fn capture(store: &ConversationStore) -> Self {
        let entries = store
            .export()
            .into_iter()
            .map(|(conversation, messages)| SnapshotEntry {
                conversation,
                messages,
            })
            .collect();
        Self {
            version: SNAPSHOT_VERSION,
            entries,
        }
    }

    /// Serialize to JSON bytes.
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Parse snapshot bytes, tolerating corruption.
    ///
    /// Returns `None` (after a `warn!`) if the bytes are not valid JSON for
    /// this schema or the version is unknown.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let snapshot: Self = match serde_json::from_slice(bytes) {
            Ok(snapshot) => snapshot,
            Err(error) => {
                warn!(%error, "Snapshot is corrupt, starting with empty state");
                return None;
            }
        };
        if snapshot.version != SNAPSHOT_VERSION {
            warn!(
                version = snapshot.version,
                expected = SNAPSHOT_VERSION,
                "Snapshot version mismatch, starting with empty state"
            );
            return None;
        }
        Some(snapshot)
    }

    /// Load every entry into a store, skipping entries that do not belong
    /// to the store's local identity.
    pub fn load_into(self, store: &mut ConversationStore) {
        for entry in self.entries {
            store.restore(entry.conversation, entry.messages);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversations::MessageQuery;
    use crate::message::{ConversationId, MessageId};
    use courier_crypto::SigningKeyPair;
    use courier_protocol::AccountId;

    fn id(n: u64) -> AccountId {
        AccountId::new(n).unwrap()
    }

    fn populated_store() -> ConversationStore {
        let mut store = ConversationStore::new(id(1));
        let keypair = SigningKeyPair::generate();
        for t in 1..=3u64 {
            store
                .append_message(PlaintextMessage {
                    id: MessageId::generate(),
                    conversation_id: ConversationId::new(id(2), id(1)),
                    sender_id: id(2),
                    recipient_id: id(1),
                    text: format!("m{}", t),
                    embeds: Vec::new(),
                    reply_to: None,
                    timestamp: t * 10,
                    signature: keypair.sign(b"test"),
                    is_read: false,
                })
                .unwrap();
        }
        store
    }

    #[test]
    fn test_capture_load_roundtrip() {
        let store = populated_store();
        let bytes = Snapshot::capture(&store).to_json().unwrap();

        let mut restored = ConversationStore::new(id(1));
        Snapshot::parse(&bytes).unwrap().load_into(&mut restored);

        assert_eq!(restored.conversation_count(), 1);
        assert_eq!(restored.message_count(id(2)), 3);
        assert_eq!(restored.conversation(id(2)).unwrap().unread_count, 3);

        let page = restored
            .get_messages(id(2), &MessageQuery::default())
            .unwrap();
        assert_eq!(page[0].text, "m3");
    }

    #[test]
    fn test_corrupt_bytes_yield_none() {
        assert!(Snapshot::parse(b"{ not json").is_none());
        assert!(Snapshot::parse(b"").is_none());
        assert!(Snapshot::parse(b"[1, 2, 3]").is_none());
    }

    #[test]
    fn test_version_mismatch_yields_none() {
        let mut snapshot = Snapshot::capture(&populated_store());
        snapshot.version = 99;
        let bytes = snapshot.to_json().unwrap();

        assert!(Snapshot::parse(&bytes).is_none());
    }

    #[test]
    fn test_foreign_entries_skipped() {
        let store = populated_store();
        let bytes = Snapshot::capture(&store).to_json().unwrap();

        // Load into a store owned by a different identity.
        let mut other = ConversationStore::new(id(9));
        Snapshot::parse(&bytes).unwrap().load_into(&mut other);

        assert_eq!(other.conversation_count(), 0);
    }
}
