//! Correlation store error types

use std::fmt;

/// Correlation store operation errors
#[derive(Debug)]
pub enum StoreError {
    /// Backend unreachable (Redis down, pool exhausted, network issues)
    ConnectionError(String),
    /// Outcome could not be encoded or decoded
    SerializationError(String),
    /// Key rejected before reaching the backend
    KeyError(String),
    /// Backend accepted the connection but the command failed
    OperationError(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::ConnectionError(msg) => write!(f, "Store connection error: {}", msg),
            StoreError::SerializationError(msg) => write!(f, "Store serialization error: {}", msg),
            StoreError::KeyError(msg) => write!(f, "Store key error: {}", msg),
            StoreError::OperationError(msg) => write!(f, "Store operation error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::SerializationError(err.to_string())
    }
}

#[cfg(feature = "cache")]
impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::ConnectionError(err.to_string())
    }
}

#[cfg(feature = "cache")]
impl From<bb8::RunError<redis::RedisError>> for StoreError {
    fn from(err: bb8::RunError<redis::RedisError>) -> Self {
        StoreError::ConnectionError(format!("Pool error: {}", err))
    }
}

impl From<StoreError> for crate::error::AppError {
    fn from(err: StoreError) -> Self {
        use crate::error::{AppError, AppErrorKind, InfrastructureError};

        AppError::new(AppErrorKind::Infrastructure(InfrastructureError::Store {
            message: err.to_string(),
        }))
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
