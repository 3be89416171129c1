//! Persistent key-value storage seams and the typed stores built on them.
//!
//! The host app supplies a [`KeyValueStore`] (backed by `SharedPreferences`
//! on Android). The core only ever touches it through the two typed
//! namespaces: [`DeviceStore`] for the registration record and [`TokenStore`]
//! for the single transaction-token slot.

mod error;

pub use error::{StorageError, StorageResult};

use std::sync::Arc;

/// Durable string key-value store provided by the host platform.
///
/// Values must survive process restarts and are cleared only by explicit
/// host action (e.g. the user wiping app data).
#[uniffi::export(with_foreign)]
pub trait KeyValueStore: Send + Sync {
    /// Reads the value stored under `key`, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store cannot be read.
    fn get(&self, key: String) -> StorageResult<Option<String>>;

    /// Durably writes `value` under `key`, overwriting any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn set(&self, key: String, value: String) -> StorageResult<()>;

    /// Removes the value stored under `key`. Removing an absent key is fine.
    ///
    /// # Errors
    ///
    /// Returns an error if the removal fails.
    fn remove(&self, key: String) -> StorageResult<()>;
}

const KEY_DEVICE_ID: &str = "device.device_id";
const KEY_IMEI: &str = "device.imei";
const KEY_KSN: &str = "device.ksn";

const KEY_TRANSACTION_TOKEN: &str = "transaction.token";
const KEY_TOKEN_EXPIRES_AT: &str = "transaction.expires_at";

/// The persisted registration record: device id, IMEI and KSN.
#[derive(Clone)]
pub struct DeviceStore {
    store: Arc<dyn KeyValueStore>,
}

impl DeviceStore {
    /// Wraps the host store with the device namespace.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Returns the saved device id, if the device has registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store cannot be read.
    pub fn device_id(&self) -> StorageResult<Option<String>> {
        self.store.get(KEY_DEVICE_ID.to_string())
    }

    /// Returns the IMEI recorded at registration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store cannot be read.
    pub fn imei(&self) -> StorageResult<Option<String>> {
        self.store.get(KEY_IMEI.to_string())
    }

    /// Returns the key serial number obtained at registration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store cannot be read.
    pub fn ksn(&self) -> StorageResult<Option<String>> {
        self.store.get(KEY_KSN.to_string())
    }

    /// Persists the device id and IMEI after a successful registration.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn save_registration(
        &self,
        device_id: &str,
        imei: &str,
    ) -> StorageResult<()> {
        self.store
            .set(KEY_DEVICE_ID.to_string(), device_id.to_string())?;
        self.store.set(KEY_IMEI.to_string(), imei.to_string())
    }

    /// Persists the KSN delivered in the registration response.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn save_ksn(&self, ksn: &str) -> StorageResult<()> {
        self.store.set(KEY_KSN.to_string(), ksn.to_string())
    }
}

/// A transaction token with its server-side expiry.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct StoredToken {
    /// The opaque single-use token issued by the attestation endpoint.
    pub token: String,
    /// Expiry timestamp as reported by the backend.
    pub expires_at: String,
}

/// The single transaction-token slot.
///
/// At most one live token exists at a time; each successful attestation
/// overwrites the slot and each successful (or auth-rejected) processing
/// call clears it.
#[derive(Clone)]
pub struct TokenStore {
    store: Arc<dyn KeyValueStore>,
}

impl TokenStore {
    /// Wraps the host store with the transaction-token namespace.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Returns the currently held token, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store cannot be read.
    pub fn current(&self) -> StorageResult<Option<StoredToken>> {
        let Some(token) = self.store.get(KEY_TRANSACTION_TOKEN.to_string())? else {
            return Ok(None);
        };
        let expires_at = self
            .store
            .get(KEY_TOKEN_EXPIRES_AT.to_string())?
            .unwrap_or_default();
        Ok(Some(StoredToken { token, expires_at }))
    }

    /// Overwrites the slot with a freshly issued token.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn save(&self, token: &str, expires_at: &str) -> StorageResult<()> {
        self.store
            .set(KEY_TRANSACTION_TOKEN.to_string(), token.to_string())?;
        self.store
            .set(KEY_TOKEN_EXPIRES_AT.to_string(), expires_at.to_string())
    }

    /// Clears the slot. Clearing an empty slot is fine.
    ///
    /// # Errors
    ///
    /// Returns an error if the removal fails.
    pub fn clear(&self) -> StorageResult<()> {
        self.store.remove(KEY_TRANSACTION_TOKEN.to_string())?;
        self.store.remove(KEY_TOKEN_EXPIRES_AT.to_string())
    }
}
