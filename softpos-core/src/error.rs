//! Error outputs for the SoftPOS client core.

use thiserror::Error;

use crate::platform::PlatformError;
use crate::storage::StorageError;

/// Error outputs from the SoftPOS client core.
///
/// Every operation returns an explicit `Result`; nothing panics past the API
/// boundary. Failure messages are descriptive text suitable for direct
/// display in the host UI.
#[derive(Debug, Error, uniffi::Error)]
#[uniffi(flat_error)]
pub enum SoftPosError {
    /// No transaction token is held locally. The caller must attest first.
    #[error("no transaction token available, attest first")]
    NoTransactionToken,

    /// The device is missing provisioning state required by the operation.
    #[error("device not provisioned: {reason}")]
    DeviceNotProvisioned {
        /// What is missing (e.g. no KSN, no registration).
        reason: String,
    },

    /// The device has not been registered with the backend yet.
    #[error("device not registered, register first")]
    DeviceNotRegistered,

    /// The presented input is not valid for the requested operation.
    #[error("invalid input for {attribute}: {reason}")]
    InvalidInput {
        /// The offending attribute.
        attribute: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Transport-level failure reaching the backend.
    #[error("network error for {url}: {error}")]
    Network {
        /// The URL that was being requested.
        url: String,
        /// Details of the transport failure.
        error: String,
    },

    /// The backend rejected the request with a non-success status.
    #[error("backend rejected request ({status}): {message}")]
    Api {
        /// HTTP status code returned by the backend.
        status: u16,
        /// Server-provided error text, or a generic fallback.
        message: String,
    },

    /// Unexpected error serializing or deserializing a payload.
    #[error("serialization error: {error}")]
    Serialization {
        /// Details of the failure.
        error: String,
    },

    /// Failure in the persistent key-value store.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Failure in a platform-provided component.
    #[error(transparent)]
    Platform(#[from] PlatformError),

    /// Any other unexpected failure.
    #[error("{error}")]
    Generic {
        /// Details of the failure.
        error: String,
    },
}

impl SoftPosError {
    /// Builds an `Api` error from a status code and an optional server body,
    /// falling back to a generic message when the body is empty.
    pub(crate) fn from_status(status: u16, body: &str) -> Self {
        let message = if body.trim().is_empty() {
            "no error details provided".to_string()
        } else {
            body.trim().to_string()
        };
        Self::Api { status, message }
    }
}
