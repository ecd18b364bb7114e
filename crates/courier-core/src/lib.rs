//! # courier-core
//!
//! The Courier direct-messaging engine: a single local identity's
//! end-to-end encrypted messaging session. The engine derives its
//! encryption keys from the identity's signing key, encrypts and signs
//! outgoing messages, verifies and decrypts inbound envelopes fail-closed,
//! and keeps all history in a bounded in-memory store.
//!
//! See [`MessagingEngine`] for the lifecycle and operations.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod engine;
pub mod error;
mod persistence;
pub mod subscription;

pub use config::{EngineConfig, EngineConfigBuilder};
pub use engine::{EngineState, EngineStatus, MessagingEngine};
pub use error::{EngineError, Result};
pub use subscription::{MessageStream, SubscriptionHandle};

pub use courier_protocol::{AccountId, WireEnvelope};
pub use courier_store::{Conversation, MessageId, MessageQuery, PlaintextMessage};
