//! Error types for network clients.

use thiserror::Error;

/// Errors that can occur constructing or using network clients.
#[derive(Error, Debug)]
pub enum NetError {
    /// Client configuration was invalid.
    #[error("Invalid network configuration: {0}")]
    InvalidConfig(String),

    /// The underlying HTTP client failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote returned an unexpected status.
    #[error("Unexpected HTTP status: {0}")]
    UnexpectedStatus(u16),
}

/// Result type for network operations.
pub type Result<T> = std::result::Result<T, NetError>;
