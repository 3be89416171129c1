//! Stateless scan turning raw device signals into threat findings.

use std::sync::Arc;

use strum::Display;

use crate::platform::DeviceSignals;

/// Threat types matching the backend enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, uniffi::Enum)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreatType {
    /// Root access detected on the device.
    RootDetection,
    /// Bootloader unlocked.
    BootloaderUnlock,
    /// System-level tampering (e.g. emulator environment).
    SystemTamper,
    /// App-level tampering (debugger, unknown installer).
    AppTamper,
    /// Compromised trusted execution environment.
    TeeCompromise,
    /// Attestation returned a low security score.
    LowSecurityScore,
    /// Repeated low security scores.
    ConsecutiveLowScores,
    /// Anything else.
    Other,
}

/// Threat severity levels matching the backend enum, ordered
/// `Low < Medium < High < Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, uniffi::Enum,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreatSeverity {
    /// Informational; nothing detected.
    Low,
    /// Worth reporting but not blocking.
    Medium,
    /// Serious integrity concern.
    High,
    /// Device must not be trusted.
    Critical,
}

/// A single finding from a threat scan.
///
/// Findings are ephemeral: recomputed on every scan and never persisted.
#[derive(Debug, Clone, uniffi::Record)]
pub struct ThreatFinding {
    /// The category of threat probed for.
    pub threat_type: ThreatType,
    /// Severity assigned to the observation.
    pub severity: ThreatSeverity,
    /// Human-readable description of the observation.
    pub description: String,
    /// Whether the threat was actually observed.
    pub detected: bool,
}

/// Synchronous, stateless threat scanner.
///
/// Reads raw signals from the platform and assigns types, severities and
/// descriptions. A full scan always yields five findings, detected or not.
pub struct ThreatDetector {
    signals: Arc<dyn DeviceSignals>,
}

impl ThreatDetector {
    /// Creates a detector over the given signal source.
    pub fn new(signals: Arc<dyn DeviceSignals>) -> Self {
        Self { signals }
    }

    /// Performs a full scan, returning one finding per probe.
    #[must_use]
    pub fn scan(&self) -> Vec<ThreatFinding> {
        vec![
            self.probe_root(),
            self.probe_debugger(),
            self.probe_emulator(),
            self.probe_installer(),
            self.probe_bootloader(),
        ]
    }

    /// Returns only the findings that were actually detected.
    #[must_use]
    pub fn detected_threats(&self) -> Vec<ThreatFinding> {
        self.scan().into_iter().filter(|t| t.detected).collect()
    }

    /// Returns the detected finding with the highest severity, if any.
    #[must_use]
    pub fn highest_severity_threat(&self) -> Option<ThreatFinding> {
        self.detected_threats()
            .into_iter()
            .max_by_key(|t| t.severity)
    }

    fn probe_root(&self) -> ThreatFinding {
        let detected = self.signals.root_indicator_present();
        ThreatFinding {
            threat_type: ThreatType::RootDetection,
            severity: if detected {
                ThreatSeverity::Critical
            } else {
                ThreatSeverity::Low
            },
            description: if detected {
                "Root access detected on device".to_string()
            } else {
                "No root access detected".to_string()
            },
            detected,
        }
    }

    fn probe_debugger(&self) -> ThreatFinding {
        let attached = self.signals.debugger_attached();
        let debug_build = self.signals.debug_build();
        let detected = attached || debug_build;
        let description = if attached {
            "Debugger is currently attached"
        } else if debug_build {
            "App is built in debug mode"
        } else {
            "No debugger detected"
        };
        ThreatFinding {
            threat_type: ThreatType::AppTamper,
            severity: if detected {
                ThreatSeverity::High
            } else {
                ThreatSeverity::Low
            },
            description: description.to_string(),
            detected,
        }
    }

    fn probe_emulator(&self) -> ThreatFinding {
        let detected = self.signals.emulator_fingerprint();
        ThreatFinding {
            threat_type: ThreatType::SystemTamper,
            severity: if detected {
                ThreatSeverity::Medium
            } else {
                ThreatSeverity::Low
            },
            description: if detected {
                "Running on emulator".to_string()
            } else {
                "Running on physical device".to_string()
            },
            detected,
        }
    }

    fn probe_installer(&self) -> ThreatFinding {
        let detected = self.signals.unknown_installer();
        ThreatFinding {
            threat_type: ThreatType::AppTamper,
            severity: if detected {
                ThreatSeverity::Medium
            } else {
                ThreatSeverity::Low
            },
            description: if detected {
                "App installed from unknown source".to_string()
            } else {
                "App installed from trusted source".to_string()
            },
            detected,
        }
    }

    fn probe_bootloader(&self) -> ThreatFinding {
        let detected = self.signals.bootloader_unlocked();
        ThreatFinding {
            threat_type: ThreatType::BootloaderUnlock,
            severity: if detected {
                ThreatSeverity::High
            } else {
                ThreatSeverity::Low
            },
            description: if detected {
                "Bootloader is unlocked".to_string()
            } else {
                "Bootloader status unknown".to_string()
            },
            detected,
        }
    }
}
