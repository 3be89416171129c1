//! Shared in-memory fakes for unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::api_log::{ApiLogEntry, ApiLogSink};
use crate::platform::DeviceSignals;
use crate::storage::{KeyValueStore, StorageResult};

/// `HashMap`-backed [`KeyValueStore`], standing in for the host's
/// encrypted preferences.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: String) -> StorageResult<Option<String>> {
        Ok(lock(&self.entries).get(&key).cloned())
    }

    fn set(&self, key: String, value: String) -> StorageResult<()> {
        lock(&self.entries).insert(key, value);
        Ok(())
    }

    fn remove(&self, key: String) -> StorageResult<()> {
        lock(&self.entries).remove(&key);
        Ok(())
    }
}

/// A store pre-seeded with a registered, key-injected device.
pub fn provisioned_store() -> Arc<MemoryStore> {
    let store = MemoryStore::new();
    store
        .set("device.device_id".to_string(), "dev-1".to_string())
        .unwrap();
    store
        .set("device.imei".to_string(), "350123450000001".to_string())
        .unwrap();
    store
        .set("device.ksn".to_string(), "FFFF9876543210E00001".to_string())
        .unwrap();
    Arc::new(store)
}

/// [`DeviceSignals`] fake with every probe scripted by a field.
pub struct ScriptedSignals {
    pub root_indicator: bool,
    pub debugger: bool,
    pub debug_build: bool,
    pub emulator: bool,
    pub unknown_installer: bool,
    pub bootloader: bool,
}

impl ScriptedSignals {
    /// A device with nothing wrong with it.
    pub const fn clean() -> Self {
        Self {
            root_indicator: false,
            debugger: false,
            debug_build: false,
            emulator: false,
            unknown_installer: false,
            bootloader: false,
        }
    }
}

impl DeviceSignals for ScriptedSignals {
    fn root_indicator_present(&self) -> bool {
        self.root_indicator
    }

    fn debugger_attached(&self) -> bool {
        self.debugger
    }

    fn debug_build(&self) -> bool {
        self.debug_build
    }

    fn emulator_fingerprint(&self) -> bool {
        self.emulator
    }

    fn unknown_installer(&self) -> bool {
        self.unknown_installer
    }

    fn bootloader_unlocked(&self) -> bool {
        self.bootloader
    }
}

/// [`ApiLogSink`] that records every entry for later assertions.
#[derive(Default)]
pub struct CollectingSink {
    entries: Mutex<Vec<ApiLogEntry>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<ApiLogEntry> {
        lock(&self.entries).clone()
    }

    pub fn bodies(&self) -> Vec<String> {
        lock(&self.entries).iter().map(|e| e.body.clone()).collect()
    }
}

impl ApiLogSink for CollectingSink {
    fn log(&self, entry: ApiLogEntry) {
        lock(&self.entries).push(entry);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
