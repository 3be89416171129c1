//! Request and response bodies for the SoftPOS backend.
//!
//! Field names reproduce the backend wire format exactly, which mixes
//! camelCase and snake_case across endpoints.

use serde::{Deserialize, Serialize};

use crate::threat::{ThreatSeverity, ThreatType};

/// Body for `POST /api/v1/devices/register`.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceRegistrationRequest {
    /// 15-digit virtual IMEI.
    pub imei: String,
    /// Device model name.
    pub model: String,
    /// OS version string.
    pub os_version: String,
    /// TEE type (`QTEE` or `TRUST_ZONE`).
    pub tee_type: String,
    /// Base64 device public key.
    pub public_key: String,
    /// Operating mode; always `FULL_POS` for this client.
    pub device_mode: String,
    /// Whether NFC hardware is present.
    pub nfc_present: bool,
}

/// Envelope returned by the registration endpoint. The `data` payload shape
/// is backend-defined; `device_id` and `ksn` are extracted from it.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceRegistrationResponse {
    /// Application-level status code (201 on success).
    pub code: i64,
    /// Human-readable server message.
    pub message: String,
    /// Opaque registration payload.
    pub data: Option<serde_json::Value>,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthCheckResponse {
    /// Backend status string.
    pub status: String,
    /// Server timestamp.
    pub timestamp: String,
}

/// Body for `POST /api/v1/threats/report`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreatReportRequest {
    /// Registered device id.
    pub device_id: String,
    /// Threat type name (e.g. `ROOT_DETECTION`).
    pub threat_type: String,
    /// Severity name (e.g. `CRITICAL`).
    pub severity: String,
    /// Human-readable finding description.
    pub description: String,
}

impl ThreatReportRequest {
    /// Builds a report body from a finding's type/severity pair.
    #[must_use]
    pub fn new(
        device_id: &str,
        threat_type: ThreatType,
        severity: ThreatSeverity,
        description: &str,
    ) -> Self {
        Self {
            device_id: device_id.to_string(),
            threat_type: threat_type.to_string(),
            severity: severity.to_string(),
            description: description.to_string(),
        }
    }
}

/// Envelope returned by the threat-report endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ThreatReportResponse {
    /// Application-level status code.
    pub code: i64,
    /// Human-readable server message.
    pub message: String,
    /// The recorded threat, when the backend echoes it back.
    pub data: Option<ThreatRecord>,
}

/// A threat as recorded by the backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)] // mirrors the backend record; not all fields are read
pub struct ThreatRecord {
    /// Server-assigned record id.
    pub id: String,
    /// Reporting device id.
    pub device_id: String,
    /// Threat type name.
    pub threat_type: String,
    /// Severity name.
    pub severity: String,
    /// Server-side handling status.
    pub status: String,
    /// Finding description.
    pub description: String,
    /// When the backend recorded the report.
    pub detected_at: String,
}

/// Body for `POST /api/v1/transactions/attest`.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionAttestRequest {
    /// Registered device id.
    #[serde(rename = "deviceId")]
    pub device_id: String,
    /// Amount in minor units.
    pub amount: i64,
    /// ISO-4217 currency code.
    pub currency: String,
}

/// Body returned by the attestation endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionAttestResponse {
    /// The single-use transaction token.
    pub transaction_token: String,
    /// Token expiry timestamp.
    pub expires_at: String,
    /// Backend's view of the device status.
    pub device_status: String,
    /// Security score computed during attestation.
    pub security_score: i64,
}

/// Body for `POST /api/v1/transactions/process`.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessTransactionRequest {
    /// Registered device id.
    #[serde(rename = "deviceId")]
    pub device_id: String,
    /// Transaction type; always `PAYMENT` for this client.
    #[serde(rename = "transactionType")]
    pub transaction_type: String,
    /// Amount in minor units.
    pub amount: i64,
    /// ISO-4217 currency code.
    pub currency: String,
    /// Placeholder encrypted PIN block.
    #[serde(rename = "encryptedPinBlock")]
    pub encrypted_pin_block: String,
    /// Key serial number from registration.
    pub ksn: String,
    /// Masked card number (first 6 + last 4 digits only).
    #[serde(rename = "cardNumberMasked")]
    pub card_number_masked: String,
    /// The held single-use token.
    #[serde(rename = "transactionToken")]
    pub transaction_token: String,
    /// Client IP address, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
    /// Latitude of the last known location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    /// Longitude of the last known location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    /// Accuracy of the location fix in meters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_accuracy: Option<f32>,
    /// Timestamp of the location fix.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_timestamp: Option<String>,
}

/// Body returned by the processing endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessTransactionResponse {
    /// Server-assigned transaction id.
    pub transaction_id: String,
    /// Final transaction status.
    pub status: String,
    /// When the backend processed the transaction.
    pub processed_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_request_uses_backend_field_names() {
        let request = ProcessTransactionRequest {
            device_id: "dev-1".to_string(),
            transaction_type: "PAYMENT".to_string(),
            amount: 10_000,
            currency: "CNY".to_string(),
            encrypted_pin_block: "PIN".to_string(),
            ksn: "KSN".to_string(),
            card_number_masked: "622202****7890".to_string(),
            transaction_token: "tok".to_string(),
            client_ip: None,
            latitude: None,
            longitude: None,
            location_accuracy: None,
            location_timestamp: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["deviceId"], "dev-1");
        assert_eq!(json["transactionType"], "PAYMENT");
        assert_eq!(json["encryptedPinBlock"], "PIN");
        assert_eq!(json["cardNumberMasked"], "622202****7890");
        assert_eq!(json["transactionToken"], "tok");
        // absent optionals are dropped, not serialized as null
        assert!(json.get("client_ip").is_none());
        assert!(json.get("latitude").is_none());
    }

    #[test]
    fn threat_report_is_camel_case() {
        let request = ThreatReportRequest::new(
            "dev-1",
            ThreatType::RootDetection,
            ThreatSeverity::Critical,
            "Root access detected on device",
        );
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["deviceId"], "dev-1");
        assert_eq!(json["threatType"], "ROOT_DETECTION");
        assert_eq!(json["severity"], "CRITICAL");
    }
}
