//! The relay transport.
//!
//! The relay is best-effort delivery only. Every send is wrapped in a hard
//! cancellation timeout, and every failure mode (connect error, timeout,
//! non-success status) is swallowed after a `warn!`. The local store is the
//! durability boundary; a relay outage must never surface to the caller.

use std::time::Duration;

use async_trait::async_trait;
use courier_protocol::{AccountId, WireEnvelope};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{NetError, Result};

/// Default hard timeout for a relay send.
pub const DEFAULT_RELAY_TIMEOUT: Duration = Duration::from_secs(10);

/// Best-effort message forwarding.
#[async_trait]
pub trait Relay: Send + Sync {
    /// Forward an envelope toward the recipient. Never fails; delivery is
    /// not acknowledged.
    async fn send_envelope(&self, envelope: &WireEnvelope);

    /// Notify a peer that their messages were read, up to a timestamp.
    async fn send_read_receipt(&self, reader: AccountId, peer: AccountId, up_to: u64);
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReadReceipt {
    reader_id: u64,
    peer_id: u64,
    timestamp: u64,
}

/// HTTP relay client.
pub struct HttpRelay {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpRelay {
    /// Create a client for a relay endpoint.
    ///
    /// # Errors
    ///
    /// Returns `NetError::InvalidConfig` if the endpoint is empty or not an
    /// http(s) URL, or the timeout is zero.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        if endpoint.is_empty() {
            return Err(NetError::InvalidConfig(
                "relay endpoint cannot be empty".into(),
            ));
        }
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(NetError::InvalidConfig(
                "relay endpoint must be an http(s) URL".into(),
            ));
        }
        if timeout.is_zero() {
            return Err(NetError::InvalidConfig(
                "relay timeout must be positive".into(),
            ));
        }
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            base_url: endpoint.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    async fn post_json<T: Serialize>(&self, path: &str, body: &T) {
        let url = format!("{}{}", self.base_url, path);
        let request = self.client.post(&url).json(body).send();

        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(response)) if response.status().is_success() => {
                debug!(%url, "Relay send accepted");
            }
            Ok(Ok(response)) => {
                warn!(%url, status = %response.status(), "Relay rejected send");
            }
            Ok(Err(error)) => {
                warn!(%url, %error, "Relay send failed");
            }
            Err(_) => {
                warn!(%url, timeout = ?self.timeout, "Relay send timed out");
            }
        }
    }
}

#[async_trait]
impl Relay for HttpRelay {
    async fn send_envelope(&self, envelope: &WireEnvelope) {
        self.post_json("/v1/messages", envelope).await;
    }

    async fn send_read_receipt(&self, reader: AccountId, peer: AccountId, up_to: u64) {
        let receipt = ReadReceipt {
            reader_id: reader.get(),
            peer_id: peer.get(),
            timestamp: up_to,
        };
        self.post_json("/v1/receipts", &receipt).await;
    }
}

/// Relay used when no endpoint is configured: drops everything.
#[derive(Debug, Default)]
pub struct NoopRelay;

#[async_trait]
impl Relay for NoopRelay {
    async fn send_envelope(&self, envelope: &WireEnvelope) {
        debug!(recipient = envelope.recipient_id, "No relay configured, envelope not forwarded");
    }

    async fn send_read_receipt(&self, _reader: AccountId, peer: AccountId, _up_to: u64) {
        debug!(peer = %peer, "No relay configured, read receipt not sent");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_validation() {
        assert!(HttpRelay::new("", DEFAULT_RELAY_TIMEOUT).is_err());
        assert!(HttpRelay::new("tcp://relay", DEFAULT_RELAY_TIMEOUT).is_err());
        assert!(HttpRelay::new("https://relay.example", Duration::ZERO).is_err());
        assert!(HttpRelay::new("https://relay.example", DEFAULT_RELAY_TIMEOUT).is_ok());
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let relay = HttpRelay::new("https://relay.example/", DEFAULT_RELAY_TIMEOUT).unwrap();
        assert_eq!(relay.base_url, "https://relay.example");
    }

    #[test]
    fn test_read_receipt_serializes_camel_case() {
        let receipt = ReadReceipt {
            reader_id: 1,
            peer_id: 2,
            timestamp: 3,
        };
        let json = serde_json::to_string(&receipt).unwrap();
        assert!(json.contains("\"readerId\":1"));
        assert!(json.contains("\"peerId\":2"));
    }

    #[tokio::test]
    async fn test_unreachable_relay_is_swallowed() {
        // Reserved TEST-NET-1 address; connection fails fast and must not
        // panic or error.
        let relay =
            HttpRelay::new("http://192.0.2.1:9", Duration::from_millis(200)).unwrap();
        relay.send_read_receipt(
            AccountId::new(1).unwrap(),
            AccountId::new(2).unwrap(),
            0,
        )
        .await;
    }

    #[tokio::test]
    async fn test_noop_relay_accepts_everything() {
        let relay = NoopRelay;
        relay
            .send_read_receipt(AccountId::new(1).unwrap(), AccountId::new(2).unwrap(), 99)
            .await;
    }
}
