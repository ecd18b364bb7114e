//! # courier-protocol
//!
//! Wire-level protocol for the Courier direct-messaging engine: the signed,
//! encrypted [`Envelope`], the canonical signing payload, and the
//! per-message encryption pipeline.
//!
//! ## Forward secrecy
//!
//! Courier's forward secrecy is one-sided. Each message is encrypted under
//! a fresh ephemeral X25519 key that the sender discards immediately, so
//! compromise of the *sender* reveals nothing about past messages. The
//! *recipient's* static key is long-lived, so its compromise exposes all
//! messages encrypted to it. This is weaker than a ratchet scheme and is
//! documented as such wherever the property matters.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod envelope;
pub mod encryption;
pub mod error;
pub mod limits;
pub mod signing;

pub use envelope::{AccountId, Envelope, WireEnvelope};
pub use encryption::{decrypt_as_recipient, encrypt_for_recipient, SealedMessage};
pub use error::{ProtocolError, Result};
pub use signing::{sign_envelope, verify_envelope, SigningPayload, SIGNING_DOMAIN};
