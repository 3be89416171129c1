//! Local threat detection and best-effort reporting to the backend.

mod detector;
mod reporter;

pub use detector::{ThreatDetector, ThreatFinding, ThreatSeverity, ThreatType};
pub use reporter::ThreatReporter;
