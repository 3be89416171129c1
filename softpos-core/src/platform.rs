//! Foreign seams for the platform components the core consumes but does not
//! implement: device identity, raw integrity signals and location/IP lookup.

use thiserror::Error;

/// Errors raised by platform-provided components.
#[derive(Debug, Error, uniffi::Error)]
pub enum PlatformError {
    /// The device keystore refused or failed an operation.
    #[error("keystore error: {0}")]
    Keystore(String),

    /// A platform component is unavailable on this device.
    #[error("platform component unavailable: {0}")]
    Unavailable(String),

    /// Unexpected `UniFFI` callback error.
    #[error("unexpected uniffi callback error: {0}")]
    UnexpectedUniFFICallbackError(String),
}

impl From<uniffi::UnexpectedUniFFICallbackError> for PlatformError {
    fn from(error: uniffi::UnexpectedUniFFICallbackError) -> Self {
        Self::UnexpectedUniFFICallbackError(error.reason)
    }
}

/// The stable device fingerprint reported during registration.
///
/// The `imei` is the 15-digit virtual IMEI the host derives from the Android
/// ID; `tee_type` is the backend's `QTEE`/`TRUST_ZONE` vocabulary.
#[derive(Debug, Clone, uniffi::Record)]
pub struct DeviceFingerprint {
    /// 15-digit virtual IMEI.
    pub imei: String,
    /// Device model name.
    pub model: String,
    /// OS version string.
    pub os_version: String,
    /// Trusted execution environment type (`QTEE` or `TRUST_ZONE`).
    pub tee_type: String,
    /// Device manufacturer.
    pub manufacturer: String,
    /// Whether the device has NFC hardware.
    pub nfc_present: bool,
}

/// Provider of the device fingerprint and the hardware-backed public key.
///
/// Implemented by the host over the platform keystore; key material never
/// enters the core.
#[uniffi::export(with_foreign)]
pub trait DeviceIdentity: Send + Sync {
    /// Returns the current device fingerprint.
    fn fingerprint(&self) -> DeviceFingerprint;

    /// Returns the device public key as base64, generating the key pair in
    /// secure hardware on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the keystore cannot produce a key.
    fn public_key(&self) -> Result<String, PlatformError>;
}

/// Raw local integrity signals consumed by the threat detector.
///
/// Each signal is a plain observation; severity assignment and report
/// construction happen in the core. Implementations should swallow platform
/// exceptions and report `false` when a probe cannot run.
#[uniffi::export(with_foreign)]
pub trait DeviceSignals: Send + Sync {
    /// Whether any su binary or superuser artifact is present.
    fn root_indicator_present(&self) -> bool;

    /// Whether a debugger is currently attached to the process.
    fn debugger_attached(&self) -> bool;

    /// Whether the app was built in debug mode.
    fn debug_build(&self) -> bool;

    /// Whether the build fingerprint matches a known emulator.
    fn emulator_fingerprint(&self) -> bool;

    /// Whether the app was installed from an unknown source.
    fn unknown_installer(&self) -> bool;

    /// Whether the bootloader is unlocked.
    fn bootloader_unlocked(&self) -> bool;
}

/// A last-known location fix.
#[derive(Debug, Clone, uniffi::Record)]
pub struct LocationFix {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Horizontal accuracy in meters.
    pub accuracy: f32,
    /// ISO-8601 timestamp of the fix.
    pub timestamp: String,
}

/// Optional location and IP context attached to processing requests.
#[uniffi::export(with_foreign)]
pub trait LocationProvider: Send + Sync {
    /// Returns the first non-loopback IPv4 address, if any.
    fn client_ip(&self) -> Option<String>;

    /// Returns the freshest last-known location, if permitted and available.
    fn last_known_location(&self) -> Option<LocationFix>;
}
