//! Error types for the cache facade
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache facade and its backends.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Missing or unresolvable cache configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A backend constructor rejected its arguments
    #[error("Failed to construct {backend} backend: {message}")]
    Construction { backend: String, message: String },

    /// A get/set/delete against the backend failed
    #[error("Backend error: {0}")]
    Backend(String),

    /// A memoized function was called before any backend was bound
    #[error("No cache bound")]
    NotBound,

    /// Packing, unpacking or key derivation failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Cache is full and eviction failed
    #[error("Cache full: {0}")]
    CacheFull(String),

    /// The bound backend does not offer the requested capability
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Builds a construction error for the named backend.
    pub fn construction(backend: impl Into<String>, message: impl std::fmt::Display) -> Self {
        CacheError::Construction {
            backend: backend.into(),
            message: message.to_string(),
        }
    }
}

// == Conversions ==
impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::Backend(format!("redis: {}", err))
    }
}

impl From<memcache::MemcacheError> for CacheError {
    fn from(err: memcache::MemcacheError) -> Self {
        CacheError::Backend(format!("memcached: {}", err))
    }
}

impl From<tokio::task::JoinError> for CacheError {
    fn from(err: tokio::task::JoinError) -> Self {
        CacheError::Internal(format!("blocking task failed: {}", err))
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::CacheFull(_) | CacheError::Backend(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
            CacheError::Config(_)
            | CacheError::Construction { .. }
            | CacheError::NotBound
            | CacheError::Serialization(_)
            | CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache facade.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_bound_message() {
        assert_eq!(CacheError::NotBound.to_string(), "No cache bound");
    }

    #[test]
    fn test_construction_message_names_backend() {
        let err = CacheError::construction("redis", "missing field `host`");
        assert_eq!(
            err.to_string(),
            "Failed to construct redis backend: missing field `host`"
        );
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (CacheError::CacheFull("k".into()), StatusCode::SERVICE_UNAVAILABLE),
            (CacheError::InvalidRequest("k".into()), StatusCode::BAD_REQUEST),
            (CacheError::Backend("down".into()), StatusCode::SERVICE_UNAVAILABLE),
            (CacheError::Unsupported("stats".into()), StatusCode::NOT_IMPLEMENTED),
            (CacheError::NotBound, StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
