//! Error types for backend operations.

use crate::format::FormatError;
use thiserror::Error;

/// Result of a backend operation.
pub type BackendResult<T> = Result<T, BackendError>;

/// Error type for backend operations.
///
/// This enum categorizes errors that can occur while talking to the cache
/// store, the lock service or the queue.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Internal backend error, state or computation error.
    ///
    /// Any error not related to network interaction.
    #[error(transparent)]
    InternalError(Box<dyn std::error::Error + Send + Sync>),

    /// Network interaction error.
    ///
    /// Errors occurring during communication with remote services.
    #[error(transparent)]
    ConnectionError(Box<dyn std::error::Error + Send + Sync>),

    /// Serialization or deserialization error.
    #[error(transparent)]
    FormatError(#[from] FormatError),
}

impl BackendError {
    /// Wraps an internal error or message.
    pub fn internal(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        BackendError::InternalError(error.into())
    }

    /// Wraps a connection error or message.
    pub fn connection(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        BackendError::ConnectionError(error.into())
    }
}
