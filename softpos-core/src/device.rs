//! Device lifecycle: backend health check, registration, and the simulated
//! provisioning endpoints of the demo backend.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;

use crate::api::{DeviceRegistrationRequest, DeviceRegistrationResponse, HealthCheckResponse};
use crate::api_log::{ApiLogSink, ApiLogger};
use crate::error::SoftPosError;
use crate::http::{endpoint, Request};
use crate::platform::DeviceIdentity;
use crate::storage::{DeviceStore, KeyValueStore};

const HEALTH_PATH: &str = "health";
const REGISTER_PATH: &str = "api/v1/devices/register";
const LOGIN_PATH: &str = "api/v1/auth/login";
const LOGOUT_PATH: &str = "api/v1/auth/logout";
const INJECT_KEY_PATH: &str = "api/v1/keys/inject";
const PINPAD_ATTEST_PATH: &str = "api/v1/pinpad/attest";

/// Client for device registration and provisioning against the SoftPOS
/// backend.
///
/// Registration is a real network call; login, logout, key injection and
/// pinpad attestation are simulated locally (the demo backend has no such
/// endpoints) but still produce request/response log entries so the host UI
/// shows a complete exchange.
#[derive(uniffi::Object)]
pub struct DeviceClient {
    device_store: DeviceStore,
    identity: Arc<dyn DeviceIdentity>,
    request: Request,
    logs: ApiLogger,
}

#[uniffi::export(async_runtime = "tokio")]
impl DeviceClient {
    /// Creates a client over the host store and identity provider, with an
    /// optional activity log sink.
    #[must_use]
    #[uniffi::constructor]
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        identity: Arc<dyn DeviceIdentity>,
        log_sink: Option<Arc<dyn ApiLogSink>>,
    ) -> Self {
        Self {
            device_store: DeviceStore::new(store),
            identity,
            request: Request::new(),
            logs: ApiLogger::new(log_sink),
        }
    }

    /// Checks backend reachability via `GET /health`.
    ///
    /// # Errors
    ///
    /// Network, backend or payload errors; never touches stored state.
    #[allow(clippy::needless_pass_by_value)]
    pub async fn health_check(&self, base_url: String) -> Result<String, SoftPosError> {
        let url = endpoint(&base_url, HEALTH_PATH);
        let started = Instant::now();
        self.logs.request("GET", &url, "");

        let response = match self.request.get(&url).await {
            Ok(response) => response,
            Err(err) => {
                self.logs.error("GET", &url, &err.to_string());
                return Err(SoftPosError::Network {
                    url,
                    error: err.to_string(),
                });
            }
        };

        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        self.logs.response("GET", &url, &text, status, started);

        if !(200..300).contains(&status) {
            return Err(SoftPosError::from_status(status, &text));
        }

        let parsed: HealthCheckResponse =
            serde_json::from_str(&text).map_err(|err| SoftPosError::Serialization {
                error: err.to_string(),
            })?;
        log::info!("backend healthy: {}", parsed.status);
        Ok(format!(
            "Health Check OK\nStatus: {}\nTimestamp: {}",
            parsed.status, parsed.timestamp
        ))
    }

    /// Registers this device with the backend.
    ///
    /// Collects the fingerprint and public key from the platform identity
    /// provider and POSTs them to the registration endpoint. On success the
    /// returned `device_id` (and `ksn`, when present) are persisted and used
    /// by every subsequent operation.
    ///
    /// # Errors
    ///
    /// Platform errors from the identity provider, network or backend
    /// failures, or a response that is not application code 201.
    #[allow(clippy::needless_pass_by_value)]
    pub async fn register_device(&self, base_url: String) -> Result<String, SoftPosError> {
        let fingerprint = self.identity.fingerprint();
        let public_key = self.identity.public_key()?;
        log::debug!(
            "registering device: imei={} model={}",
            fingerprint.imei,
            fingerprint.model
        );

        let body = DeviceRegistrationRequest {
            imei: fingerprint.imei.clone(),
            model: fingerprint.model,
            os_version: fingerprint.os_version,
            tee_type: fingerprint.tee_type,
            public_key,
            device_mode: "FULL_POS".to_string(),
            nfc_present: fingerprint.nfc_present,
        };

        let url = endpoint(&base_url, REGISTER_PATH);
        let started = Instant::now();
        self.logs.request(
            "POST",
            &url,
            &serde_json::to_string(&body).unwrap_or_default(),
        );

        let response = match self.request.post(&url, &body).await {
            Ok(response) => response,
            Err(err) => {
                self.logs.error("POST", &url, &err.to_string());
                log::error!("registration transport failure: {err}");
                return Err(SoftPosError::Network {
                    url,
                    error: err.to_string(),
                });
            }
        };

        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        self.logs.response("POST", &url, &text, status, started);

        if !(200..300).contains(&status) {
            log::error!("registration rejected with status {status}");
            return Err(SoftPosError::from_status(status, &text));
        }

        let parsed: DeviceRegistrationResponse =
            serde_json::from_str(&text).map_err(|err| SoftPosError::Serialization {
                error: err.to_string(),
            })?;
        if parsed.code != 201 {
            return Err(SoftPosError::Api {
                status,
                message: parsed.message,
            });
        }

        // The data payload is opaque except for device_id and ksn.
        let data = parsed.data.unwrap_or(serde_json::Value::Null);
        if let Some(device_id) = data.get("device_id").and_then(serde_json::Value::as_str) {
            self.device_store
                .save_registration(device_id, &fingerprint.imei)?;
            log::info!("device registered with id {device_id}");
        }
        if let Some(ksn) = data.get("ksn").and_then(serde_json::Value::as_str) {
            self.device_store.save_ksn(ksn)?;
            log::info!("ksn saved from registration");
        }

        Ok(format!("Success: {}\nData: {data}", parsed.message))
    }

    /// Simulated login. Logs a mock request/response pair; no network.
    ///
    /// # Errors
    ///
    /// Currently never fails; the `Result` keeps the exported surface
    /// uniform for when the real endpoint lands.
    #[allow(clippy::needless_pass_by_value)]
    pub async fn login(&self, base_url: String) -> Result<String, SoftPosError> {
        let url = endpoint(&base_url, LOGIN_PATH);
        let started = Instant::now();
        self.logs.request(
            "POST",
            &url,
            &json!({"username": "demo_user", "password": "demo_pass"}).to_string(),
        );

        tokio::time::sleep(Duration::from_millis(500)).await;

        let mock = json!({"token": "mock_token_12345", "user": "demo_user"});
        self.logs
            .response("POST", &url, &mock.to_string(), 200, started);
        Ok("Login Successful\nToken: mock_token_12345".to_string())
    }

    /// Simulated logout. Logs a mock request/response pair; no network.
    ///
    /// # Errors
    ///
    /// Currently never fails.
    #[allow(clippy::needless_pass_by_value)]
    pub async fn logout(&self, base_url: String) -> Result<String, SoftPosError> {
        let url = endpoint(&base_url, LOGOUT_PATH);
        let started = Instant::now();
        self.logs.request("POST", &url, "");

        tokio::time::sleep(Duration::from_millis(300)).await;

        self.logs.response(
            "POST",
            &url,
            r#"{"message": "Logged out successfully"}"#,
            200,
            started,
        );
        Ok("Logout Successful".to_string())
    }

    /// Simulated DUKPT key injection.
    ///
    /// Requires a registered device and the KSN persisted at registration;
    /// the injected key material itself is mocked.
    ///
    /// # Errors
    ///
    /// [`SoftPosError::DeviceNotRegistered`] without a device id, or
    /// [`SoftPosError::DeviceNotProvisioned`] without a stored KSN.
    #[allow(clippy::needless_pass_by_value)]
    pub async fn inject_key(&self, base_url: String) -> Result<String, SoftPosError> {
        let Some(device_id) = self.device_store.device_id()? else {
            return Err(SoftPosError::DeviceNotRegistered);
        };
        let Some(ksn) = self.device_store.ksn()? else {
            return Err(SoftPosError::DeviceNotProvisioned {
                reason: "no KSN stored, register device first".to_string(),
            });
        };

        let url = endpoint(&base_url, INJECT_KEY_PATH);
        let started = Instant::now();
        self.logs
            .request("POST", &url, &json!({"device_id": device_id}).to_string());

        tokio::time::sleep(Duration::from_millis(800)).await;

        let mock = json!({
            "status": "success",
            "key_type": "TMK",
            "kcv": "A1B2C3",
            "ksn": ksn,
            "encrypted_ipek": "MOCK_ENCRYPTED_IPEK_BASE64"
        });
        self.logs
            .response("POST", &url, &mock.to_string(), 200, started);
        log::info!("key injection simulated for ksn {ksn}");
        Ok(format!(
            "Key Injection Successful\nType: TMK\nKCV: A1B2C3\nKSN: {ksn}"
        ))
    }

    /// Simulated pinpad attestation against the device's TEE type.
    ///
    /// # Errors
    ///
    /// [`SoftPosError::DeviceNotRegistered`] without a device id.
    #[allow(clippy::needless_pass_by_value)]
    pub async fn attest_pinpad(&self, base_url: String) -> Result<String, SoftPosError> {
        let Some(device_id) = self.device_store.device_id()? else {
            return Err(SoftPosError::DeviceNotRegistered);
        };
        let tee_type = self.identity.fingerprint().tee_type;

        let url = endpoint(&base_url, PINPAD_ATTEST_PATH);
        let started = Instant::now();
        self.logs.request(
            "POST",
            &url,
            &json!({
                "device_id": device_id,
                "tee_type": tee_type,
                "attestation_data": "mock_attestation_blob"
            })
            .to_string(),
        );

        tokio::time::sleep(Duration::from_millis(600)).await;

        self.logs.response(
            "POST",
            &url,
            &json!({"verified": true, "attestation_status": "VALID"}).to_string(),
            200,
            started,
        );
        Ok("PinPad Attestation Successful\nStatus: VALID".to_string())
    }

    /// The persisted device id, if registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn device_id(&self) -> Result<Option<String>, SoftPosError> {
        Ok(self.device_store.device_id()?)
    }

    /// The IMEI recorded at registration, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn imei(&self) -> Result<Option<String>, SoftPosError> {
        Ok(self.device_store.imei()?)
    }

    /// The persisted key serial number, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn ksn(&self) -> Result<Option<String>, SoftPosError> {
        Ok(self.device_store.ksn()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{DeviceFingerprint, DeviceIdentity, PlatformError};
    use crate::test_support::{CollectingSink, MemoryStore};
    use crate::api_log::ApiLogKind;

    struct FakeIdentity;

    impl DeviceIdentity for FakeIdentity {
        fn fingerprint(&self) -> DeviceFingerprint {
            DeviceFingerprint {
                imei: "350123450000001".to_string(),
                model: "Pixel 8".to_string(),
                os_version: "14".to_string(),
                tee_type: "TEE_STRONGBOX".to_string(),
                manufacturer: "Google".to_string(),
                nfc_present: true,
            }
        }

        fn public_key(&self) -> Result<String, PlatformError> {
            Ok("MIIBIjANBgkq-test-key".to_string())
        }
    }

    fn client(store: Arc<MemoryStore>) -> DeviceClient {
        DeviceClient::new(store, Arc::new(FakeIdentity), None)
    }

    #[tokio::test]
    async fn health_check_formats_backend_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/health")
            .with_status(200)
            .with_body(r#"{"status":"UP","timestamp":"2025-01-01T00:00:00Z"}"#)
            .create_async()
            .await;

        let client = client(Arc::new(MemoryStore::new()));
        let summary = client.health_check(server.url()).await.unwrap();
        assert!(summary.contains("Status: UP"));
        assert!(summary.contains("Timestamp: 2025-01-01T00:00:00Z"));
    }

    #[tokio::test]
    async fn registration_sends_fingerprint_and_persists_identity() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/devices/register")
            .match_request(|req| {
                let body = req.utf8_lossy_body().unwrap();
                body.contains(r#""imei":"350123450000001""#)
                    && body.contains(r#""device_mode":"FULL_POS""#)
                    && body.contains(r#""public_key":"MIIBIjANBgkq-test-key""#)
                    && body.contains(r#""nfc_present":true"#)
            })
            .with_status(201)
            .with_body(
                serde_json::json!({
                    "code": 201,
                    "message": "Device registered",
                    "data": {
                        "device_id": "dev-42",
                        "ksn": "FFFF9876543210E00001",
                        "merchant": "demo"
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let store = Arc::new(MemoryStore::new());
        let client = client(Arc::clone(&store));
        let summary = client.register_device(server.url()).await.unwrap();
        assert!(summary.starts_with("Success: Device registered"));
        mock.assert_async().await;

        assert_eq!(client.device_id().unwrap().as_deref(), Some("dev-42"));
        assert_eq!(client.imei().unwrap().as_deref(), Some("350123450000001"));
        assert_eq!(
            client.ksn().unwrap().as_deref(),
            Some("FFFF9876543210E00001")
        );
    }

    #[tokio::test]
    async fn registration_with_non_201_code_fails_and_persists_nothing() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v1/devices/register")
            .with_status(200)
            .with_body(r#"{"code":409,"message":"Device already registered","data":null}"#)
            .create_async()
            .await;

        let client = client(Arc::new(MemoryStore::new()));
        let result = client.register_device(server.url()).await;
        match result {
            Err(SoftPosError::Api { message, .. }) => {
                assert_eq!(message, "Device already registered");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
        assert_eq!(client.device_id().unwrap(), None);
    }

    #[tokio::test]
    async fn inject_key_requires_registration_then_ksn() {
        let store = Arc::new(MemoryStore::new());
        let client = client(Arc::clone(&store));

        let result = client.inject_key("http://localhost".to_string()).await;
        assert!(matches!(result, Err(SoftPosError::DeviceNotRegistered)));

        let device_store = DeviceStore::new(store);
        device_store
            .save_registration("dev-1", "350123450000001")
            .unwrap();
        let result = client.inject_key("http://localhost".to_string()).await;
        assert!(matches!(
            result,
            Err(SoftPosError::DeviceNotProvisioned { .. })
        ));

        device_store.save_ksn("FFFF9876543210E00001").unwrap();
        let summary = client
            .inject_key("http://localhost".to_string())
            .await
            .unwrap();
        assert!(summary.contains("KSN: FFFF9876543210E00001"));
    }

    #[tokio::test]
    async fn simulated_endpoints_log_request_and_response_pairs() {
        let sink = Arc::new(CollectingSink::new());
        let client = DeviceClient::new(
            Arc::new(MemoryStore::new()),
            Arc::new(FakeIdentity),
            Some(Arc::clone(&sink) as Arc<dyn ApiLogSink>),
        );

        let summary = client.login("http://localhost/".to_string()).await.unwrap();
        assert_eq!(summary, "Login Successful\nToken: mock_token_12345");
        let summary = client
            .logout("http://localhost/".to_string())
            .await
            .unwrap();
        assert_eq!(summary, "Logout Successful");

        let entries = sink.entries();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].kind, ApiLogKind::Request);
        assert_eq!(entries[1].kind, ApiLogKind::Response);
        assert_eq!(entries[1].status_code, Some(200));
        assert!(entries[0].url.ends_with("/api/v1/auth/login"));
        assert!(entries[2].url.ends_with("/api/v1/auth/logout"));
    }
}
