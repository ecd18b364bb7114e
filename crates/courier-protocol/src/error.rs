//! Error types for protocol operations.

use thiserror::Error;

/// Errors that can occur during protocol operations.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// An envelope failed ingress validation.
    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(String),

    /// Decryption failed (tag mismatch, wrong key, or malformed input).
    #[error("Decryption failed")]
    DecryptionFailed,

    /// Decrypted payload was not valid UTF-8.
    #[error("Plaintext is not valid UTF-8")]
    InvalidPlaintext,

    /// Underlying cryptographic failure.
    #[error("Cryptographic error: {0}")]
    Crypto(#[from] courier_crypto::CryptoError),
}

/// Result type for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
