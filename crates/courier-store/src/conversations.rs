//! The bounded conversation store.
//!
//! All decrypted history lives here, in memory, owned by one local identity.
//! Two caps bound total memory: each conversation holds at most N messages
//! (oldest dropped first), and at most M conversations exist at once (the
//! least-recently-updated is evicted with its messages when a new one would
//! exceed the cap).

use std::collections::HashMap;

use courier_protocol::AccountId;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::message::{Conversation, ConversationId, MessageId, PlaintextMessage};

/// Default per-conversation message cap.
pub const DEFAULT_MAX_MESSAGES: usize = 500;

/// Default conversation cap.
pub const DEFAULT_MAX_CONVERSATIONS: usize = 256;

/// Default page size when a query does not specify one.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Pagination parameters for [`ConversationStore::get_messages`].
///
/// At most one of `before` / `after` may be set. Cursors are positional: the
/// page starts adjacent to the referenced message in the timestamp-descending
/// view, with ties between equal timestamps broken by insertion order.
#[derive(Clone, Copy, Debug, Default)]
pub struct MessageQuery {
    /// Return messages strictly older than this one.
    pub before: Option<MessageId>,
    /// Return messages strictly newer than this one.
    pub after: Option<MessageId>,
    /// Maximum page size; `None` means [`DEFAULT_PAGE_SIZE`].
    pub limit: Option<usize>,
}

/// In-memory store of conversations and decrypted messages.
pub struct ConversationStore {
    local_id: AccountId,
    max_messages_per_conversation: usize,
    max_conversations: usize,
    conversations: HashMap<ConversationId, Conversation>,
    messages: HashMap<ConversationId, Vec<PlaintextMessage>>,
}

impl ConversationStore {
    /// Create an empty store with default caps.
    pub fn new(local_id: AccountId) -> Self {
        Self::with_caps(local_id, DEFAULT_MAX_MESSAGES, DEFAULT_MAX_CONVERSATIONS)
    }

    /// Create an empty store with explicit caps.
    pub fn with_caps(
        local_id: AccountId,
        max_messages_per_conversation: usize,
        max_conversations: usize,
    ) -> Self {
        Self {
            local_id,
            max_messages_per_conversation: max_messages_per_conversation.max(1),
            max_conversations: max_conversations.max(1),
            conversations: HashMap::new(),
            messages: HashMap::new(),
        }
    }

    /// The identity that owns this store.
    pub fn local_id(&self) -> AccountId {
        self.local_id
    }

    /// Number of conversations currently held.
    pub fn conversation_count(&self) -> usize {
        self.conversations.len()
    }

    /// Number of messages stored for a peer, zero if no conversation exists.
    pub fn message_count(&self, peer: AccountId) -> usize {
        let id = ConversationId::new(self.local_id, peer);
        self.messages.get(&id).map_or(0, Vec::len)
    }

    /// Get the conversation with a peer, if one exists.
    pub fn conversation(&self, peer: AccountId) -> Option<&Conversation> {
        self.conversations
            .get(&ConversationId::new(self.local_id, peer))
    }

    /// Get or create the conversation with a peer.
    ///
    /// Creating a conversation while at the conversation cap evicts the
    /// least-recently-updated one first, along with all its messages.
    pub fn upsert_conversation(&mut self, peer: AccountId) -> Result<&Conversation> {
        if peer == self.local_id {
            return Err(StoreError::InvalidQuery(
                "cannot converse with self".into(),
            ));
        }
        let id = ConversationId::new(self.local_id, peer);

        if !self.conversations.contains_key(&id) {
            if self.conversations.len() >= self.max_conversations {
                self.evict_least_recent();
            }
            let now = now_millis();
            self.conversations.insert(
                id,
                Conversation {
                    id,
                    participants: id.participants(),
                    last_message: None,
                    unread_count: 0,
                    created_at: now,
                    updated_at: now,
                    is_archived: false,
                    is_muted: false,
                },
            );
            self.messages.insert(id, Vec::new());
        }

        // The entry was just inserted if it was absent.
        Ok(&self.conversations[&id])
    }

    /// Append a message to its conversation.
    ///
    /// Creates the conversation if needed, enforces the per-conversation
    /// message cap (oldest dropped), and maintains unread accounting: an
    /// inbound message stored unread increments the counter, outbound
    /// messages never do.
    pub fn append_message(&mut self, message: PlaintextMessage) -> Result<()> {
        let peer = message
            .conversation_id
            .peer_of(self.local_id)
            .ok_or(StoreError::NotAParticipant)?;
        if message.conversation_id != ConversationId::new(message.sender_id, message.recipient_id)
        {
            return Err(StoreError::InvalidQuery(
                "conversation id does not match sender/recipient pair".into(),
            ));
        }

        self.upsert_conversation(peer)?;
        let id = message.conversation_id;

        let inbound_unread = message.sender_id != self.local_id && !message.is_read;

        let queue = self.messages.entry(id).or_default();
        queue.push(message.clone());
        if queue.len() > self.max_messages_per_conversation {
            let dropped = queue.remove(0);
            debug!(conversation = %id, message = %dropped.id, "Dropped oldest message at cap");
        }

        if let Some(conversation) = self.conversations.get_mut(&id) {
            if inbound_unread {
                conversation.unread_count += 1;
            }
            conversation.updated_at = message.timestamp.max(conversation.updated_at);
            conversation.last_message = Some(message);
        }

        Ok(())
    }

    /// List conversations, most recently updated first.
    pub fn list_conversations(&self, include_archived: bool) -> Vec<Conversation> {
        let mut list: Vec<Conversation> = self
            .conversations
            .values()
            .filter(|c| include_archived || !c.is_archived)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        list
    }

    /// Page through a conversation's messages, newest first.
    ///
    /// With no cursor, returns the newest `limit` messages. A `before`
    /// cursor returns the `limit` messages immediately older than the
    /// referenced one; `after` returns the `limit` messages immediately
    /// newer, still newest-first.
    pub fn get_messages(
        &self,
        peer: AccountId,
        query: &MessageQuery,
    ) -> Result<Vec<PlaintextMessage>> {
        if query.before.is_some() && query.after.is_some() {
            return Err(StoreError::InvalidQuery(
                "'before' and 'after' are mutually exclusive".into(),
            ));
        }
        let id = ConversationId::new(self.local_id, peer);
        let queue = self
            .messages
            .get(&id)
            .ok_or(StoreError::ConversationNotFound(peer))?;
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);

        // Newest first; equal timestamps keep insertion order, so the
        // later-inserted message sorts first in the descending view.
        let mut view: Vec<&PlaintextMessage> = queue.iter().collect();
        view.reverse();
        view.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let page: Vec<&PlaintextMessage> = if let Some(cursor) = query.before {
            let pos = cursor_position(&view, cursor)?;
            view[pos + 1..].iter().take(limit).copied().collect()
        } else if let Some(cursor) = query.after {
            let pos = cursor_position(&view, cursor)?;
            let start = pos.saturating_sub(limit);
            view[start..pos].to_vec()
        } else {
            view.iter().take(limit).copied().collect()
        };

        Ok(page.into_iter().cloned().collect())
    }

    /// Mark every message in a conversation as read and zero the unread
    /// counter. Returns the number of messages flipped.
    pub fn mark_read(&mut self, peer: AccountId) -> Result<u64> {
        let id = ConversationId::new(self.local_id, peer);
        let conversation = self
            .conversations
            .get_mut(&id)
            .ok_or(StoreError::ConversationNotFound(peer))?;
        conversation.unread_count = 0;

        let mut flipped = 0;
        if let Some(queue) = self.messages.get_mut(&id) {
            for message in queue.iter_mut().filter(|m| !m.is_read) {
                message.is_read = true;
                flipped += 1;
            }
        }
        if let Some(last) = conversation.last_message.as_mut() {
            last.is_read = true;
        }
        Ok(flipped)
    }

    /// Set the archived flag.
    pub fn set_archived(&mut self, peer: AccountId, archived: bool) -> Result<()> {
        self.flag_mut(peer, |c| c.is_archived = archived)
    }

    /// Set the muted flag.
    pub fn set_muted(&mut self, peer: AccountId, muted: bool) -> Result<()> {
        self.flag_mut(peer, |c| c.is_muted = muted)
    }

    fn flag_mut(&mut self, peer: AccountId, apply: impl FnOnce(&mut Conversation)) -> Result<()> {
        let id = ConversationId::new(self.local_id, peer);
        let conversation = self
            .conversations
            .get_mut(&id)
            .ok_or(StoreError::ConversationNotFound(peer))?;
        apply(conversation);
        Ok(())
    }

    /// Export every conversation with its messages, for snapshotting.
    pub fn export(&self) -> Vec<(Conversation, Vec<PlaintextMessage>)> {
        self.conversations
            .values()
            .map(|c| {
                let messages = self.messages.get(&c.id).cloned().unwrap_or_default();
                (c.clone(), messages)
            })
            .collect()
    }

    /// Restore one conversation and its messages from a snapshot.
    ///
    /// Entries that do not involve the local identity or whose id does not
    /// match their participants are skipped. Caps are re-applied.
    pub fn restore(&mut self, conversation: Conversation, messages: Vec<PlaintextMessage>) {
        let id = conversation.id;
        if id.peer_of(self.local_id).is_none() || id.participants() != conversation.participants {
            debug!(conversation = %id, "Skipped foreign snapshot entry");
            return;
        }
        if !self.conversations.contains_key(&id) && self.conversations.len() >= self.max_conversations
        {
            self.evict_least_recent();
        }

        let mut messages: Vec<PlaintextMessage> = messages
            .into_iter()
            .filter(|m| m.conversation_id == id)
            .collect();
        if messages.len() > self.max_messages_per_conversation {
            let excess = messages.len() - self.max_messages_per_conversation;
            messages.drain(..excess);
        }

        self.conversations.insert(id, conversation);
        self.messages.insert(id, messages);
    }

    fn evict_least_recent(&mut self) {
        let oldest = self
            .conversations
            .values()
            .min_by_key(|c| c.updated_at)
            .map(|c| c.id);
        if let Some(id) = oldest {
            self.conversations.remove(&id);
            let dropped = self.messages.remove(&id).map_or(0, |m| m.len());
            debug!(conversation = %id, messages = dropped, "Evicted least-recent conversation at cap");
        }
    }
}

fn cursor_position(view: &[&PlaintextMessage], cursor: MessageId) -> Result<usize> {
    view.iter()
        .position(|m| m.id == cursor)
        .ok_or(StoreError::CursorNotFound(cursor))
}

fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}


#[cfg(test)]
mod proptests {
    use super::*;
    use courier_crypto::SigningKeyPair;
    use proptest::prelude::*;

    fn id(n: u64) -> AccountId {
        AccountId::new(n).unwrap()
    }

    fn inbound(timestamp: u64) -> PlaintextMessage {
        let keypair = SigningKeyPair::generate();
        PlaintextMessage {
            id: MessageId::generate(),
            conversation_id: ConversationId::new(id(2), id(1)),
            sender_id: id(2),
            recipient_id: id(1),
            text: String::from("x"),
            embeds: Vec::new(),
            reply_to: None,
            timestamp,
            signature: keypair.sign(b"test"),
            is_read: false,
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn message_cap_always_holds(count in 1usize..64, cap in 1usize..16) {
            let mut store = ConversationStore::with_caps(id(1), cap, 8);
            for t in 0..count {
                store.append_message(inbound(t as u64)).unwrap();
            }
            prop_assert!(store.message_count(id(2)) <= cap);
        }

        #[test]
        fn unread_count_matches_unread_messages(count in 0usize..64) {
            let mut store = ConversationStore::with_caps(id(1), 128, 8);
            for t in 0..count {
                store.append_message(inbound(t as u64)).unwrap();
            }
            if count > 0 {
                let unread = store.conversation(id(2)).unwrap().unread_count;
                prop_assert_eq!(unread, count as u64);
            }
        }
    }
}
