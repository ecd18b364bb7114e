//! Session-token authentication.
//!
//! The gateway trusts an upstream login flow: it is constructed with a
//! fixed table of session tokens and the account each belongs to. Every
//! request must carry a known token in the `x-session-token` header.

use std::collections::HashMap;

use axum::http::HeaderMap;

use courier_core::AccountId;

use crate::error::{GatewayError, Result};

/// Header carrying the session token.
pub const SESSION_HEADER: &str = "x-session-token";

/// Immutable token-to-account table.
#[derive(Debug, Default)]
pub struct SessionTable {
    tokens: HashMap<String, AccountId>,
}

impl SessionTable {
    /// Build a table from (token, account) pairs.
    pub fn new(sessions: impl IntoIterator<Item = (String, AccountId)>) -> Self {
        Self {
            tokens: sessions.into_iter().collect(),
        }
    }

    /// Resolve the request's session token to an account.
    ///
    /// # Errors
    ///
    /// `Unauthorized` when the header is missing, unreadable, or unknown.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<AccountId> {
        let token = headers
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or(GatewayError::Unauthorized)?;
        self.tokens
            .get(token)
            .copied()
            .ok_or(GatewayError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn table() -> SessionTable {
        SessionTable::new([("tok-abc".to_string(), AccountId::new(7).unwrap())])
    }

    #[test]
    fn test_known_token_resolves() {
        let mut headers = HeaderMap::new();
        headers.insert(SESSION_HEADER, HeaderValue::from_static("tok-abc"));

        assert_eq!(
            table().authenticate(&headers).unwrap(),
            AccountId::new(7).unwrap()
        );
    }

    #[test]
    fn test_missing_header_is_unauthorized() {
        let result = table().authenticate(&HeaderMap::new());
        assert!(matches!(result, Err(GatewayError::Unauthorized)));
    }

    #[test]
    fn test_unknown_token_is_unauthorized() {
        let mut headers = HeaderMap::new();
        headers.insert(SESSION_HEADER, HeaderValue::from_static("tok-wrong"));

        let result = table().authenticate(&headers);
        assert!(matches!(result, Err(GatewayError::Unauthorized)));
    }
}
