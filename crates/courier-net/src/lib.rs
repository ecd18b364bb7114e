//! # courier-net
//!
//! HTTP clients for Courier's two external collaborators: the identity
//! directory (key oracle) and the message relay (best-effort forwarding).
//! Both are behind traits so the engine can be tested without a network.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod directory;
pub mod error;
pub mod relay;

pub use directory::{Directory, HttpDirectory, ENCRYPTION_KEY_RECORD};
pub use error::{NetError, Result};
pub use relay::{HttpRelay, NoopRelay, Relay, DEFAULT_RELAY_TIMEOUT};
