//! The Courier messaging engine.
//!
//! [`MessagingEngine`] owns one local identity's keys, its conversation
//! store, and its connections to the directory and relay. It follows a
//! linear lifecycle:
//!
//! ```text
//! Uninitialized ──initialize()──► Initializing ──► Ready
//!                                                    │
//!                                              shutdown()
//!                                                    │
//!                                                    ▼
//!                                          ShuttingDown ──► Closed
//! ```
//!
//! Engines are single-session: once `Closed`, an engine cannot be
//! re-initialized. `shutdown` is idempotent.
//!
//! # Security Notes
//!
//! - The static encryption keypair is derived from the signing key at
//!   initialization and lives only in process memory
//! - Inbound envelopes are verified before decryption; failures drop the
//!   envelope silently with a `warn!`
//! - Relay delivery is fire-and-forget; the local store is the durability
//!   boundary

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use courier_crypto::{derive_encryption_keypair, EncryptionKeyPair, SigningKeyPair};
use courier_net::{Directory, HttpDirectory, HttpRelay, NoopRelay, Relay};
use courier_protocol::limits::MAX_EMBEDS;
use courier_protocol::{
    decrypt_as_recipient, encrypt_for_recipient, verify_envelope, AccountId, Envelope,
    SealedMessage, SigningPayload, WireEnvelope,
};
use courier_store::{
    Conversation, ConversationId, ConversationStore, MessageId, MessageQuery, PlaintextMessage,
    Snapshot,
};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::persistence;
use crate::subscription::{MessageStream, SubscriptionHandle, SubscriptionRegistry};

/// Lifecycle state of the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    /// Constructed, keys not yet derived.
    Uninitialized,

    /// `initialize` is in progress.
    Initializing,

    /// All operations available.
    Ready,

    /// `shutdown` is in progress; no new operations accepted.
    ShuttingDown,

    /// Shut down. The engine cannot be reused.
    Closed,
}

impl EngineState {
    /// Whether operations are accepted.
    pub fn is_ready(&self) -> bool {
        matches!(self, EngineState::Ready)
    }

    /// Human-readable description.
    pub fn description(&self) -> &'static str {
        match self {
            EngineState::Uninitialized => "Uninitialized",
            EngineState::Initializing => "Initializing",
            EngineState::Ready => "Ready",
            EngineState::ShuttingDown => "Shutting down",
            EngineState::Closed => "Closed",
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Point-in-time engine status.
#[derive(Clone, Debug, Serialize)]
pub struct EngineStatus {
    /// Local account id.
    pub account_id: u64,
    /// Current lifecycle state.
    pub state: String,
    /// Hex of the derived encryption public key, once initialized.
    pub encryption_public_key: Option<String>,
}

/// The decrypted message body carried inside every envelope.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessagePayload {
    text: String,
    #[serde(default)]
    embeds: Vec<String>,
    #[serde(default)]
    reply_to: Option<String>,
}

/// Keys and state that exist only between `initialize` and `shutdown`.
struct EngineServices {
    signing: SigningKeyPair,
    encryption: EncryptionKeyPair,
    store: ConversationStore,
}

impl fmt::Debug for EngineServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineServices")
            .field("signing", &"[SigningKeyPair]")
            .field("encryption", &self.encryption)
            .finish()
    }
}

/// The end-to-end encrypted direct-messaging engine.
pub struct MessagingEngine {
    config: EngineConfig,
    local_id: AccountId,
    state: Arc<RwLock<EngineState>>,
    services: Arc<RwLock<Option<EngineServices>>>,
    subscriptions: Arc<SubscriptionRegistry>,
    directory: Arc<dyn Directory>,
    relay: Arc<dyn Relay>,
}

impl MessagingEngine {
    /// Create an engine with HTTP collaborators built from the config.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let directory: Arc<dyn Directory> =
            Arc::new(HttpDirectory::new(&config.network.directory_endpoint)?);
        let relay: Arc<dyn Relay> = match &config.network.relay_endpoint {
            Some(endpoint) => Arc::new(HttpRelay::new(endpoint, config.network.relay_timeout)?),
            None => Arc::new(NoopRelay),
        };
        Self::with_collaborators(config, directory, relay)
    }

    /// Create an engine with explicit collaborators.
    ///
    /// This is the seam used to run the engine against in-process fakes.
    pub fn with_collaborators(
        config: EngineConfig,
        directory: Arc<dyn Directory>,
        relay: Arc<dyn Relay>,
    ) -> Result<Self> {
        config.validate()?;
        let local_id = AccountId::new(config.identity.account_id)?;
        Ok(Self {
            config,
            local_id,
            state: Arc::new(RwLock::new(EngineState::Uninitialized)),
            services: Arc::new(RwLock::new(None)),
            subscriptions: Arc::new(SubscriptionRegistry::new()),
            directory,
            relay,
        })
    }

    /// The local account id.
    pub fn local_id(&self) -> AccountId {
        self.local_id
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> EngineState {
        *self.state.read().await
    }

    /// Derive keys, load any snapshot, and move to `Ready`.
    ///
    /// # Errors
    ///
    /// Fails `NotInitialized` if called in any state other than
    /// `Uninitialized` (engines are single-session), or propagates key
    /// derivation failures.
    pub async fn initialize(&self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if *state != EngineState::Uninitialized {
                return Err(EngineError::NotInitialized(*state));
            }
            *state = EngineState::Initializing;
        }

        let seed = hex::decode(&self.config.identity.signing_key_hex)
            .map_err(|_| EngineError::Validation("signing key is not valid hex".into()))?;
        let signing = SigningKeyPair::from_bytes(&seed)?;
        let encryption = derive_encryption_keypair(&signing)?;

        let mut store = ConversationStore::with_caps(
            self.local_id,
            self.config.store.max_messages_per_conversation,
            self.config.store.max_conversations,
        );
        if self.config.persistence.enabled {
            if let Some(snapshot) = persistence::load(&self.config.persistence.path).await {
                snapshot.load_into(&mut store);
                info!(
                    conversations = store.conversation_count(),
                    "Restored conversations from snapshot"
                );
            }
        }

        *self.services.write().await = Some(EngineServices {
            signing,
            encryption,
            store,
        });
        *self.state.write().await = EngineState::Ready;
        info!(account = %self.local_id, "Messaging engine ready");
        Ok(())
    }

    /// Encrypt, sign, and send a message.
    ///
    /// The envelope is handed to the relay fire-and-forget; the returned
    /// message is already stored locally as read.
    ///
    /// # Errors
    ///
    /// `Validation` for bad input, `KeyNotFound` if the recipient has no
    /// published encryption key, `NotInitialized` outside `Ready`.
    pub async fn send(
        &self,
        recipient: AccountId,
        text: &str,
        embeds: Vec<String>,
        reply_to: Option<MessageId>,
    ) -> Result<PlaintextMessage> {
        self.ensure_ready().await?;
        self.validate_outgoing(recipient, text, &embeds)?;

        let recipient_key = self
            .directory
            .lookup_encryption_key(recipient)
            .await
            .ok_or(EngineError::KeyNotFound(recipient))?;

        let payload = MessagePayload {
            text: text.to_string(),
            embeds: embeds.clone(),
            reply_to: reply_to.map(|id| id.to_hex()),
        };
        let payload_json = serde_json::to_string(&payload)
            .map_err(|e| EngineError::Validation(format!("payload did not serialize: {}", e)))?;

        let sealed = encrypt_for_recipient(payload_json.as_bytes(), &recipient_key)?;
        let timestamp = now_millis();

        let mut services_guard = self.services.write().await;
        let services = services_guard
            .as_mut()
            .ok_or(EngineError::NotInitialized(EngineState::Uninitialized))?;

        let signing_payload = SigningPayload {
            environment: &self.config.environment,
            sender_id: self.local_id,
            recipient_id: recipient,
            timestamp,
            ciphertext: &sealed.ciphertext,
        };
        let signature = services.signing.sign(&signing_payload.canonical_bytes());

        let envelope = Envelope {
            ciphertext: sealed.ciphertext,
            nonce: sealed.nonce,
            ephemeral_public_key: sealed.ephemeral_public_key,
            sender_id: self.local_id,
            recipient_id: recipient,
            timestamp,
            signature: signature.clone(),
        };

        let wire = envelope.to_wire();
        let relay = Arc::clone(&self.relay);
        tokio::spawn(async move {
            relay.send_envelope(&wire).await;
        });

        let message = PlaintextMessage {
            id: MessageId::generate(),
            conversation_id: ConversationId::new(self.local_id, recipient),
            sender_id: self.local_id,
            recipient_id: recipient,
            text: text.to_string(),
            embeds,
            reply_to,
            timestamp,
            signature,
            is_read: true,
        };
        services.store.append_message(message.clone())?;
        debug!(recipient = %recipient, message = %message.id, "Message sent");
        Ok(message)
    }

    /// Process an inbound wire envelope.
    ///
    /// Verify-then-decrypt, fail closed: any problem (bad shape, wrong
    /// recipient, unknown signer, bad signature, failed decryption,
    /// unparseable payload) drops the envelope with a `warn!` and stores
    /// nothing. Accepted messages are stored unread and fanned out to every
    /// subscriber and live stream.
    pub async fn handle_incoming(&self, wire: &WireEnvelope) {
        if !self.state().await.is_ready() {
            warn!("Dropped inbound envelope: engine not ready");
            return;
        }

        let envelope = match Envelope::from_wire(wire) {
            Ok(envelope) => envelope,
            Err(error) => {
                warn!(%error, "Dropped inbound envelope: malformed");
                return;
            }
        };
        if envelope.recipient_id != self.local_id {
            warn!(
                recipient = %envelope.recipient_id,
                "Dropped inbound envelope: addressed to another account"
            );
            return;
        }

        let sender = envelope.sender_id;
        let Some(signer_key) = self.directory.lookup_signer_key(sender).await else {
            warn!(sender = %sender, "Dropped inbound envelope: no active signer key");
            return;
        };
        if !verify_envelope(&envelope, &self.config.environment, &signer_key) {
            warn!(sender = %sender, "Dropped inbound envelope: signature verification failed");
            return;
        }

        let mut services_guard = self.services.write().await;
        let Some(services) = services_guard.as_mut() else {
            warn!("Dropped inbound envelope: engine not ready");
            return;
        };

        let sealed = SealedMessage {
            ciphertext: envelope.ciphertext.clone(),
            nonce: envelope.nonce.clone(),
            ephemeral_public_key: envelope.ephemeral_public_key.clone(),
        };
        let plaintext = match decrypt_as_recipient(&sealed, services.encryption.private_key()) {
            Ok(plaintext) => plaintext,
            Err(error) => {
                warn!(sender = %sender, %error, "Dropped inbound envelope: decryption failed");
                return;
            }
        };
        let payload: MessagePayload = match serde_json::from_str(&plaintext) {
            Ok(payload) => payload,
            Err(error) => {
                warn!(sender = %sender, %error, "Dropped inbound envelope: unparseable payload");
                return;
            }
        };
        if payload.text.is_empty()
            || payload.text.chars().count() > self.config.max_text_len
            || payload.embeds.len() > MAX_EMBEDS
        {
            warn!(sender = %sender, "Dropped inbound envelope: payload exceeds limits");
            return;
        }

        let message = PlaintextMessage {
            id: MessageId::generate(),
            conversation_id: ConversationId::new(sender, self.local_id),
            sender_id: sender,
            recipient_id: self.local_id,
            text: payload.text,
            embeds: payload.embeds,
            reply_to: payload.reply_to.as_deref().and_then(MessageId::from_hex),
            timestamp: envelope.timestamp,
            signature: envelope.signature,
            is_read: false,
        };
        if let Err(error) = services.store.append_message(message.clone()) {
            warn!(sender = %sender, %error, "Dropped inbound envelope: store rejected message");
            return;
        }
        drop(services_guard);

        debug!(sender = %sender, message = %message.id, "Inbound message accepted");
        self.subscriptions.publish(&message);
    }

    /// Register a synchronous callback for inbound messages.
    pub async fn subscribe(
        &self,
        callback: impl Fn(&PlaintextMessage) + Send + Sync + 'static,
    ) -> Result<SubscriptionHandle> {
        self.ensure_ready().await?;
        Ok(self.subscriptions.subscribe(callback))
    }

    /// Open a pull stream of inbound messages.
    ///
    /// Each call returns an independent stream starting at the next
    /// delivered message. Dropping the stream unregisters it.
    pub async fn stream_messages(&self) -> Result<MessageStream> {
        self.ensure_ready().await?;
        Ok(self.subscriptions.stream())
    }

    /// List conversations, most recently updated first.
    pub async fn list_conversations(&self, include_archived: bool) -> Result<Vec<Conversation>> {
        self.ensure_ready().await?;
        let guard = self.services.read().await;
        let services = guard
            .as_ref()
            .ok_or(EngineError::NotInitialized(EngineState::Uninitialized))?;
        Ok(services.store.list_conversations(include_archived))
    }

    /// Get the conversation with a peer.
    pub async fn conversation(&self, peer: AccountId) -> Result<Option<Conversation>> {
        self.ensure_ready().await?;
        let guard = self.services.read().await;
        let services = guard
            .as_ref()
            .ok_or(EngineError::NotInitialized(EngineState::Uninitialized))?;
        Ok(services.store.conversation(peer).cloned())
    }

    /// Page through a conversation's messages, newest first.
    pub async fn get_messages(
        &self,
        peer: AccountId,
        query: &MessageQuery,
    ) -> Result<Vec<PlaintextMessage>> {
        self.ensure_ready().await?;
        let guard = self.services.read().await;
        let services = guard
            .as_ref()
            .ok_or(EngineError::NotInitialized(EngineState::Uninitialized))?;
        Ok(services.store.get_messages(peer, query)?)
    }

    /// Mark a conversation read and send a best-effort read receipt.
    ///
    /// Returns the number of messages flipped to read.
    pub async fn mark_read(&self, peer: AccountId) -> Result<u64> {
        self.ensure_ready().await?;
        let flipped = {
            let mut guard = self.services.write().await;
            let services = guard
                .as_mut()
                .ok_or(EngineError::NotInitialized(EngineState::Uninitialized))?;
            services.store.mark_read(peer)?
        };

        let relay = Arc::clone(&self.relay);
        let local = self.local_id;
        tokio::spawn(async move {
            relay.send_read_receipt(local, peer, now_millis()).await;
        });
        Ok(flipped)
    }

    /// Set a conversation's archived flag.
    pub async fn set_archived(&self, peer: AccountId, archived: bool) -> Result<()> {
        self.ensure_ready().await?;
        let mut guard = self.services.write().await;
        let services = guard
            .as_mut()
            .ok_or(EngineError::NotInitialized(EngineState::Uninitialized))?;
        Ok(services.store.set_archived(peer, archived)?)
    }

    /// Set a conversation's muted flag.
    pub async fn set_muted(&self, peer: AccountId, muted: bool) -> Result<()> {
        self.ensure_ready().await?;
        let mut guard = self.services.write().await;
        let services = guard
            .as_mut()
            .ok_or(EngineError::NotInitialized(EngineState::Uninitialized))?;
        Ok(services.store.set_muted(peer, muted)?)
    }

    /// Publish the derived encryption public key to the directory.
    ///
    /// Returns the hex of the published key.
    pub async fn publish_encryption_key(&self) -> Result<String> {
        self.ensure_ready().await?;
        let key = {
            let guard = self.services.read().await;
            let services = guard
                .as_ref()
                .ok_or(EngineError::NotInitialized(EngineState::Uninitialized))?;
            services.encryption.public_key().clone()
        };
        self.directory
            .publish_encryption_key(self.local_id, &key)
            .await?;
        info!(account = %self.local_id, "Published encryption key");
        Ok(hex::encode(key.as_bytes()))
    }

    /// Current status, available in every lifecycle state.
    pub async fn status(&self) -> EngineStatus {
        let state = self.state().await;
        let encryption_public_key = self
            .services
            .read()
            .await
            .as_ref()
            .map(|s| hex::encode(s.encryption.public_key().as_bytes()));
        EngineStatus {
            account_id: self.local_id.get(),
            state: state.to_string(),
            encryption_public_key,
        }
    }

    /// Shut down the engine, persisting a snapshot if configured.
    ///
    /// Idempotent: calling `shutdown` on an already closed (or never
    /// initialized) engine is a no-op.
    pub async fn shutdown(&self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            match *state {
                EngineState::ShuttingDown | EngineState::Closed => return Ok(()),
                EngineState::Uninitialized => {
                    *state = EngineState::Closed;
                    return Ok(());
                }
                EngineState::Initializing | EngineState::Ready => {
                    *state = EngineState::ShuttingDown;
                }
            }
        }

        if self.config.persistence.enabled {
            let snapshot = {
                let guard = self.services.read().await;
                guard.as_ref().map(|s| Snapshot::capture(&s.store))
            };
            if let Some(snapshot) = snapshot {
                if let Err(error) = persistence::save(&self.config.persistence.path, &snapshot).await
                {
                    warn!(%error, "Snapshot save failed during shutdown");
                }
            }
        }

        // Drop keys and history.
        *self.services.write().await = None;
        *self.state.write().await = EngineState::Closed;
        info!(account = %self.local_id, "Messaging engine closed");
        Ok(())
    }

    async fn ensure_ready(&self) -> Result<()> {
        let state = self.state().await;
        if !state.is_ready() {
            return Err(EngineError::NotInitialized(state));
        }
        Ok(())
    }

    fn validate_outgoing(
        &self,
        recipient: AccountId,
        text: &str,
        embeds: &[String],
    ) -> Result<()> {
        if recipient == self.local_id {
            return Err(EngineError::Validation(
                "cannot send a message to yourself".into(),
            ));
        }
        if text.trim().is_empty() {
            return Err(EngineError::Validation("message text is empty".into()));
        }
        let chars = text.chars().count();
        if chars > self.config.max_text_len {
            return Err(EngineError::Validation(format!(
                "message text too long: {} chars (max {})",
                chars, self.config.max_text_len
            )));
        }
        if embeds.len() > MAX_EMBEDS {
            return Err(EngineError::Validation(format!(
                "too many embeds: {} (max {})",
                embeds.len(),
                MAX_EMBEDS
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for MessagingEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessagingEngine")
            .field("local_id", &self.local_id)
            .finish_non_exhaustive()
    }
}

fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
