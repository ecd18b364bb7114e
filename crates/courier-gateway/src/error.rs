//! Gateway error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::warn;

use courier_core::EngineError;
use courier_store::StoreError;

/// Errors mapped to HTTP responses.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Missing or unknown session token.
    #[error("Unauthorized")]
    Unauthorized,

    /// Per-identity rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Malformed request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Engine failure.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl GatewayError {
    fn status(&self) -> StatusCode {
        match self {
            GatewayError::Unauthorized => StatusCode::UNAUTHORIZED,
            GatewayError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Engine(engine) => match engine {
                EngineError::Validation(_) => StatusCode::BAD_REQUEST,
                EngineError::KeyNotFound(_) => StatusCode::NOT_FOUND,
                EngineError::NotInitialized(_) => StatusCode::SERVICE_UNAVAILABLE,
                EngineError::Store(StoreError::ConversationNotFound(_)) => StatusCode::NOT_FOUND,
                EngineError::Store(StoreError::CursorNotFound(_)) => StatusCode::BAD_REQUEST,
                EngineError::Store(StoreError::InvalidQuery(_)) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            warn!(error = %self, "Gateway internal error");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Result type for gateway handlers.
pub type Result<T> = std::result::Result<T, GatewayError>;
