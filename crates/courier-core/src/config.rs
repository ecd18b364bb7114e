//! Engine configuration.
//!
//! # Example
//!
//! ```
//! use courier_core::config::EngineConfigBuilder;
//!
//! let config = EngineConfigBuilder::new()
//!     .with_identity(42, "a".repeat(64))
//!     .with_directory("https://directory.example")
//!     .with_relay("https://relay.example")
//!     .with_environment("staging")
//!     .build();
//!
//! assert!(config.validate().is_ok());
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use courier_net::DEFAULT_RELAY_TIMEOUT;
use courier_protocol::limits::MAX_TEXT_LEN;
use courier_store::{DEFAULT_MAX_CONVERSATIONS, DEFAULT_MAX_MESSAGES};

/// Configuration validation error.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A configuration field holds an invalid value.
    #[error("Invalid config value for '{field}': {reason}")]
    InvalidValue {
        /// Dotted path of the offending field.
        field: String,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Local identity configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Account id of the local identity.
    pub account_id: u64,

    /// Hex-encoded 32-byte Ed25519 signing key seed.
    ///
    /// This is the identity's root secret: the static encryption keypair is
    /// derived from it at initialization. Load it from a secret manager or
    /// protected file, never from a world-readable config.
    pub signing_key_hex: String,
}

/// External collaborator endpoints.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Identity directory endpoint (required).
    pub directory_endpoint: String,

    /// Relay endpoint. When absent the engine runs store-only: sends are
    /// recorded locally and never forwarded.
    pub relay_endpoint: Option<String>,

    /// Hard cancellation timeout applied to every relay send.
    pub relay_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            directory_endpoint: String::new(),
            relay_endpoint: None,
            relay_timeout: DEFAULT_RELAY_TIMEOUT,
        }
    }
}

/// Store caps.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreLimits {
    /// Maximum messages retained per conversation.
    pub max_messages_per_conversation: usize,

    /// Maximum conversations retained.
    pub max_conversations: usize,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            max_messages_per_conversation: DEFAULT_MAX_MESSAGES,
            max_conversations: DEFAULT_MAX_CONVERSATIONS,
        }
    }
}

/// Snapshot persistence settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Load a snapshot at initialization and save one at shutdown.
    pub enabled: bool,

    /// Snapshot file path.
    pub path: PathBuf,
}

/// Full engine configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Local identity.
    pub identity: IdentityConfig,

    /// Directory and relay endpoints.
    pub network: NetworkConfig,

    /// Store caps.
    pub store: StoreLimits,

    /// Snapshot persistence.
    pub persistence: PersistenceConfig,

    /// Deployment environment tag, mixed into every signed payload so
    /// traffic cannot cross environments.
    pub environment: String,

    /// Maximum message text length in characters.
    pub max_text_len: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            identity: IdentityConfig::default(),
            network: NetworkConfig::default(),
            store: StoreLimits::default(),
            persistence: PersistenceConfig::default(),
            environment: "production".into(),
            max_text_len: MAX_TEXT_LEN,
        }
    }
}

impl EngineConfig {
    /// Create a configuration builder.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::new()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.identity.account_id == 0 {
            return Err(invalid("identity.account_id", "must be positive"));
        }
        match hex::decode(&self.identity.signing_key_hex) {
            Ok(bytes) if bytes.len() == 32 => {}
            Ok(_) => {
                return Err(invalid(
                    "identity.signing_key_hex",
                    "must decode to exactly 32 bytes",
                ))
            }
            Err(_) => return Err(invalid("identity.signing_key_hex", "must be valid hex")),
        }

        if !is_http_url(&self.network.directory_endpoint) {
            return Err(invalid(
                "network.directory_endpoint",
                "must be an http(s) URL",
            ));
        }
        if let Some(relay) = &self.network.relay_endpoint {
            if !is_http_url(relay) {
                return Err(invalid("network.relay_endpoint", "must be an http(s) URL"));
            }
        }
        if self.network.relay_timeout.is_zero() {
            return Err(invalid("network.relay_timeout", "must be positive"));
        }

        if self.store.max_messages_per_conversation == 0 {
            return Err(invalid(
                "store.max_messages_per_conversation",
                "must be positive",
            ));
        }
        if self.store.max_conversations == 0 {
            return Err(invalid("store.max_conversations", "must be positive"));
        }

        if self.persistence.enabled && self.persistence.path.as_os_str().is_empty() {
            return Err(invalid(
                "persistence.path",
                "cannot be empty when persistence is enabled",
            ));
        }

        if self.environment.is_empty() {
            return Err(invalid("environment", "cannot be empty"));
        }
        // One-byte length prefix in the signed payload.
        if self.environment.len() > 255 {
            return Err(invalid("environment", "must be at most 255 bytes"));
        }

        if self.max_text_len == 0 || self.max_text_len > MAX_TEXT_LEN {
            return Err(invalid(
                "max_text_len",
                &format!("must be between 1 and {}", MAX_TEXT_LEN),
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.into(),
        reason: reason.into(),
    }
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Builder for [`EngineConfig`].
#[derive(Clone, Debug, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Create a builder with default values.
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }

    /// Set the local identity.
    pub fn with_identity(mut self, account_id: u64, signing_key_hex: impl Into<String>) -> Self {
        self.config.identity.account_id = account_id;
        self.config.identity.signing_key_hex = signing_key_hex.into();
        self
    }

    /// Set the directory endpoint.
    pub fn with_directory(mut self, endpoint: impl Into<String>) -> Self {
        self.config.network.directory_endpoint = endpoint.into();
        self
    }

    /// Set the relay endpoint.
    pub fn with_relay(mut self, endpoint: impl Into<String>) -> Self {
        self.config.network.relay_endpoint = Some(endpoint.into());
        self
    }

    /// Set the relay send timeout.
    pub fn with_relay_timeout(mut self, timeout: Duration) -> Self {
        self.config.network.relay_timeout = timeout;
        self
    }

    /// Set the environment tag.
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.config.environment = environment.into();
        self
    }

    /// Set store caps.
    pub fn with_store_caps(mut self, max_messages: usize, max_conversations: usize) -> Self {
        self.config.store.max_messages_per_conversation = max_messages;
        self.config.store.max_conversations = max_conversations;
        self
    }

    /// Enable snapshot persistence at a path.
    pub fn with_persistence(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.persistence.enabled = true;
        self.config.persistence.path = path.into();
        self
    }

    /// Set the maximum message text length.
    pub fn with_max_text_len(mut self, max: usize) -> Self {
        self.config.max_text_len = max;
        self
    }

    /// Finish building. Call [`EngineConfig::validate`] before use.
    pub fn build(self) -> EngineConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> EngineConfig {
        EngineConfigBuilder::new()
            .with_identity(7, hex::encode([1u8; 32]))
            .with_directory("https://directory.example")
            .build()
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_default_config_is_incomplete() {
        assert!(EngineConfig::default().validate().is_err());
    }

    #[test]
    fn test_rejects_zero_account() {
        let mut config = valid_config();
        config.identity.account_id = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_signing_key() {
        let mut config = valid_config();
        config.identity.signing_key_hex = "zz".into();
        assert!(config.validate().is_err());

        config.identity.signing_key_hex = hex::encode([1u8; 16]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_endpoints() {
        let mut config = valid_config();
        config.network.directory_endpoint = "directory.example".into();
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.network.relay_endpoint = Some("not a url".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_timeout_and_caps() {
        let mut config = valid_config();
        config.network.relay_timeout = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.store.max_conversations = 0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.max_text_len = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_persistence_requires_path() {
        let mut config = valid_config();
        config.persistence.enabled = true;
        assert!(config.validate().is_err());

        config.persistence.path = PathBuf::from("/tmp/courier.snapshot");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_environment_limits() {
        let mut config = valid_config();
        config.environment = String::new();
        assert!(config.validate().is_err());

        config.environment = "e".repeat(256);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = valid_config();
        let json = serde_json::to_string(&config).unwrap();
        let restored: EngineConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.identity.account_id, config.identity.account_id);
        assert_eq!(
            restored.network.directory_endpoint,
            config.network.directory_endpoint
        );
        assert_eq!(restored.environment, config.environment);
    }
}
