//! # courier-gateway
//!
//! A session-authenticated REST surface over a [`MessagingEngine`]. The
//! gateway is single-tenant: it exposes the one identity its engine was
//! initialized with, guarded by a session-token table and per-identity
//! rate limits.
//!
//! [`MessagingEngine`]: courier_core::MessagingEngine

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod error;
pub mod ratelimit;
pub mod routes;

pub use auth::{SessionTable, SESSION_HEADER};
pub use error::{GatewayError, Result};
pub use ratelimit::{OpClass, RateLimiter, DEFAULT_READ_LIMIT, DEFAULT_SEND_LIMIT, DEFAULT_WINDOW};
pub use routes::{router, GatewayState};
