//! Error types for the messaging engine.

use courier_protocol::AccountId;
use thiserror::Error;

use crate::config::ConfigError;
use crate::engine::EngineState;

/// Errors surfaced to engine callers.
///
/// Only validation, key resolution, and lifecycle problems reach the
/// caller. Inbound authentication/decryption failures and transport
/// failures are handled internally (dropped or swallowed with a log line)
/// and never appear here.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The engine is not in the `Ready` state.
    #[error("Engine is not ready (state: {0})")]
    NotInitialized(EngineState),

    /// Caller input failed validation.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The recipient has no published encryption key.
    #[error("No encryption key published for account {0}")]
    KeyNotFound(AccountId),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Cryptographic failure.
    #[error("Crypto error: {0}")]
    Crypto(#[from] courier_crypto::CryptoError),

    /// Protocol failure.
    #[error("Protocol error: {0}")]
    Protocol(#[from] courier_protocol::ProtocolError),

    /// Store failure.
    #[error("Store error: {0}")]
    Store(#[from] courier_store::StoreError),

    /// Network client failure.
    #[error("Network error: {0}")]
    Net(#[from] courier_net::NetError),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
