//! The identity directory client.
//!
//! The directory is a read-mostly key oracle: it maps account ids to
//! published encryption keys and registered signing keys. Lookups degrade
//! to "not found" on every failure mode (network, status, parse, bad key
//! bytes) so a flaky directory can never crash the engine; callers treat
//! `None` as an absent key.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use courier_crypto::{Ed25519PublicKey, X25519PublicKey};
use courier_protocol::AccountId;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{NetError, Result};

/// Record kind under which encryption keys are published.
pub const ENCRYPTION_KEY_RECORD: &str = "encryption-public-key";

/// Key oracle for account identities.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Resolve the most recently published encryption key for an account.
    ///
    /// `None` means the account is unknown, has no published key, or the
    /// directory could not be reached.
    async fn lookup_encryption_key(&self, id: AccountId) -> Option<X25519PublicKey>;

    /// Resolve the most recently registered active signing key.
    async fn lookup_signer_key(&self, id: AccountId) -> Option<Ed25519PublicKey>;

    /// Publish an encryption key record for an account.
    async fn publish_encryption_key(&self, id: AccountId, key: &X25519PublicKey) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    #[serde(default)]
    records: Vec<DirectoryRecord>,
    #[serde(default)]
    signers: Vec<SignerRecord>,
}

#[derive(Debug, Deserialize)]
struct DirectoryRecord {
    kind: String,
    value: String,
    updated_at: u64,
}

#[derive(Debug, Deserialize)]
struct SignerRecord {
    key: String,
    active: bool,
    registered_at: u64,
}

#[derive(Debug, Serialize)]
struct PublishRecordRequest<'a> {
    kind: &'a str,
    value: String,
}

/// HTTP directory client.
pub struct HttpDirectory {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDirectory {
    /// Create a client for a directory endpoint.
    ///
    /// # Errors
    ///
    /// Returns `NetError::InvalidConfig` if the endpoint is empty or not an
    /// http(s) URL.
    pub fn new(endpoint: &str) -> Result<Self> {
        if endpoint.is_empty() {
            return Err(NetError::InvalidConfig(
                "directory endpoint cannot be empty".into(),
            ));
        }
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(NetError::InvalidConfig(
                "directory endpoint must be an http(s) URL".into(),
            ));
        }
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            base_url: endpoint.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch_account(&self, id: AccountId) -> Option<AccountResponse> {
        let url = format!("{}/v1/accounts/{}", self.base_url, id);
        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(error) => {
                warn!(account = %id, %error, "Directory request failed");
                return None;
            }
        };
        if !response.status().is_success() {
            warn!(account = %id, status = %response.status(), "Directory lookup miss");
            return None;
        }
        match response.json::<AccountResponse>().await {
            Ok(account) => Some(account),
            Err(error) => {
                warn!(account = %id, %error, "Directory response did not parse");
                None
            }
        }
    }
}

#[async_trait]
impl Directory for HttpDirectory {
    async fn lookup_encryption_key(&self, id: AccountId) -> Option<X25519PublicKey> {
        let account = self.fetch_account(id).await?;
        newest_encryption_key(&account)
    }

    async fn lookup_signer_key(&self, id: AccountId) -> Option<Ed25519PublicKey> {
        let account = self.fetch_account(id).await?;
        newest_active_signer(&account)
    }

    async fn publish_encryption_key(&self, id: AccountId, key: &X25519PublicKey) -> Result<()> {
        let url = format!("{}/v1/accounts/{}/records", self.base_url, id);
        let body = PublishRecordRequest {
            kind: ENCRYPTION_KEY_RECORD,
            value: BASE64.encode(key.as_bytes()),
        };
        let response = self.client.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(NetError::UnexpectedStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

fn newest_encryption_key(account: &AccountResponse) -> Option<X25519PublicKey> {
    let record = account
        .records
        .iter()
        .filter(|r| r.kind == ENCRYPTION_KEY_RECORD)
        .max_by_key(|r| r.updated_at)?;
    let bytes = BASE64.decode(&record.value).ok()?;
    X25519PublicKey::from_bytes(&bytes).ok()
}

fn newest_active_signer(account: &AccountResponse) -> Option<Ed25519PublicKey> {
    let signer = account
        .signers
        .iter()
        .filter(|s| s.active)
        .max_by_key(|s| s.registered_at)?;
    let bytes = BASE64.decode(&signer.key).ok()?;
    Ed25519PublicKey::from_bytes(&bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_crypto::{SigningKeyPair, X25519StaticPrivateKey};

    fn account_json(records: serde_json::Value, signers: serde_json::Value) -> AccountResponse {
        serde_json::from_value(serde_json::json!({
            "records": records,
            "signers": signers,
        }))
        .unwrap()
    }

    #[test]
    fn test_endpoint_validation() {
        assert!(HttpDirectory::new("").is_err());
        assert!(HttpDirectory::new("ftp://directory").is_err());
        assert!(HttpDirectory::new("https://directory.example").is_ok());
    }

    #[test]
    fn test_newest_encryption_key_wins() {
        let old_key = X25519StaticPrivateKey::generate().public_key();
        let new_key = X25519StaticPrivateKey::generate().public_key();
        let account = account_json(
            serde_json::json!([
                { "kind": ENCRYPTION_KEY_RECORD, "value": BASE64.encode(old_key.as_bytes()), "updated_at": 100 },
                { "kind": ENCRYPTION_KEY_RECORD, "value": BASE64.encode(new_key.as_bytes()), "updated_at": 200 },
                { "kind": "display-name", "value": "bm90IGEga2V5", "updated_at": 300 },
            ]),
            serde_json::json!([]),
        );

        assert_eq!(newest_encryption_key(&account), Some(new_key));
    }

    #[test]
    fn test_missing_or_malformed_key_is_none() {
        let account = account_json(serde_json::json!([]), serde_json::json!([]));
        assert!(newest_encryption_key(&account).is_none());

        let account = account_json(
            serde_json::json!([
                { "kind": ENCRYPTION_KEY_RECORD, "value": "!!! not base64", "updated_at": 1 },
            ]),
            serde_json::json!([]),
        );
        assert!(newest_encryption_key(&account).is_none());

        let account = account_json(
            serde_json::json!([
                { "kind": ENCRYPTION_KEY_RECORD, "value": BASE64.encode([0u8; 16]), "updated_at": 1 },
            ]),
            serde_json::json!([]),
        );
        assert!(newest_encryption_key(&account).is_none());
    }

    #[test]
    fn test_inactive_signers_skipped() {
        let active = SigningKeyPair::generate().public_key();
        let revoked = SigningKeyPair::generate().public_key();
        let account = account_json(
            serde_json::json!([]),
            serde_json::json!([
                { "key": BASE64.encode(revoked.as_bytes()), "active": false, "registered_at": 500 },
                { "key": BASE64.encode(active.as_bytes()), "active": true, "registered_at": 100 },
            ]),
        );

        assert_eq!(newest_active_signer(&account), Some(active));
    }

    #[test]
    fn test_newest_active_signer_wins() {
        let older = SigningKeyPair::generate().public_key();
        let newer = SigningKeyPair::generate().public_key();
        let account = account_json(
            serde_json::json!([]),
            serde_json::json!([
                { "key": BASE64.encode(older.as_bytes()), "active": true, "registered_at": 100 },
                { "key": BASE64.encode(newer.as_bytes()), "active": true, "registered_at": 200 },
            ]),
        );

        assert_eq!(newest_active_signer(&account), Some(newer));
    }

    #[test]
    fn test_account_response_tolerates_missing_fields() {
        let account: AccountResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(account.records.is_empty());
        assert!(account.signers.is_empty());
    }
}
