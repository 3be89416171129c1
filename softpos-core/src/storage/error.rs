//! Error types for the persistent key-value store.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by the host-provided key-value store.
#[derive(Debug, Error, uniffi::Error)]
pub enum StorageError {
    /// The underlying store failed to read or write.
    #[error("key-value store error: {0}")]
    Backend(String),

    /// Unexpected `UniFFI` callback error.
    #[error("unexpected uniffi callback error: {0}")]
    UnexpectedUniFFICallbackError(String),
}

impl From<uniffi::UnexpectedUniFFICallbackError> for StorageError {
    fn from(error: uniffi::UnexpectedUniFFICallbackError) -> Self {
        Self::UnexpectedUniFFICallbackError(error.reason)
    }
}
