//! Core library for the SoftPOS demo client.
//!
//! Implements device registration, the single-use transaction-token
//! lifecycle, local threat detection with offline-tolerant reporting, and
//! simulated provisioning flows against the SoftPOS demo backend. The host
//! app supplies platform capabilities (storage, device identity, integrity
//! signals, location) through the foreign traits in [`storage`] and
//! [`platform`] and consumes the exported objects over UniFFI.

mod api;
pub use api::*;

mod api_log;
pub use api_log::*;

mod device;
pub use device::*;

mod error;
pub use error::*;

mod logger;
pub use logger::*;

mod platform;
pub use platform::*;

pub mod storage;

mod threat;
pub use threat::*;

mod transaction;
pub use transaction::*;

// private modules
mod http;

#[cfg(test)]
mod test_support;

uniffi::setup_scaffolding!("softpos_core");
