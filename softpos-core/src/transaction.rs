//! Transaction-token lifecycle: attest to obtain a single-use token, spend
//! it in a processing call, invalidate it on success, expiry or auth
//! rejection.

use std::sync::Arc;
use std::time::Instant;

use crate::api::{
    ProcessTransactionRequest, ProcessTransactionResponse,
    TransactionAttestRequest, TransactionAttestResponse,
};
use crate::api_log::{ApiLogSink, ApiLogger};
use crate::error::SoftPosError;
use crate::http::{endpoint, Request};
use crate::platform::LocationProvider;
use crate::storage::{DeviceStore, KeyValueStore, StoredToken, TokenStore};

const ATTEST_PATH: &str = "api/v1/transactions/attest";
const PROCESS_PATH: &str = "api/v1/transactions/process";

/// Result of a successful attestation call.
#[derive(Debug, Clone, uniffi::Record)]
pub struct AttestationInfo {
    /// The issued single-use token (also persisted into the token slot).
    pub transaction_token: String,
    /// Token expiry timestamp as reported by the backend.
    pub expires_at: String,
    /// Backend's view of the device status.
    pub device_status: String,
    /// Security score computed during attestation.
    pub security_score: i64,
}

/// Result of a successful processing call.
#[derive(Debug, Clone, uniffi::Record)]
pub struct TransactionOutcome {
    /// Server-assigned transaction id.
    pub transaction_id: String,
    /// Final transaction status.
    pub status: String,
    /// When the backend processed the transaction.
    pub processed_at: String,
}

/// Enforces that funds-moving requests are authorized by a short-lived,
/// single-use token.
///
/// The token lives in a single persisted slot: attestation fills (or
/// overwrites) it, a successful processing call consumes it, and a 401/403
/// from the processing endpoint clears it so the next attempt is forced to
/// re-attest. Any other processing failure leaves the slot untouched because
/// the token may still be valid.
#[derive(uniffi::Object)]
pub struct TransactionTokenManager {
    token_store: TokenStore,
    device_store: DeviceStore,
    location: Option<Arc<dyn LocationProvider>>,
    request: Request,
    logs: ApiLogger,
}

#[uniffi::export(async_runtime = "tokio")]
impl TransactionTokenManager {
    /// Creates a manager over the host key-value store, with an optional
    /// location provider for transaction context and an optional activity
    /// log sink.
    #[must_use]
    #[uniffi::constructor]
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        location: Option<Arc<dyn LocationProvider>>,
        log_sink: Option<Arc<dyn ApiLogSink>>,
    ) -> Self {
        Self {
            token_store: TokenStore::new(Arc::clone(&store)),
            device_store: DeviceStore::new(store),
            location,
            request: Request::new(),
            logs: ApiLogger::new(log_sink),
        }
    }

    /// Requests transaction attestation and stores the issued token as the
    /// single current token, overwriting any previous one.
    ///
    /// # Errors
    ///
    /// Fails on transport errors or a non-success status; in both cases the
    /// persisted token slot is left untouched.
    #[allow(clippy::needless_pass_by_value)]
    pub async fn attest_transaction(
        &self,
        base_url: String,
        device_id: String,
        amount_minor_units: i64,
        currency: String,
    ) -> Result<AttestationInfo, SoftPosError> {
        let url = endpoint(&base_url, ATTEST_PATH);
        let body = TransactionAttestRequest {
            device_id,
            amount: amount_minor_units,
            currency,
        };

        log::info!(
            "requesting transaction attestation, amount: {} {}",
            body.amount,
            body.currency
        );
        let started = Instant::now();
        self.logs.request("POST", &url, &to_json(&body)?);

        let response = match self.request.post(&url, &body).await {
            Ok(response) => response,
            Err(err) => {
                self.logs.error("POST", &url, &err.to_string());
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
            log::error!("attestation failed with status {status}");
            return Err(SoftPosError::from_status(status, &text));
        }

        let parsed: TransactionAttestResponse = serde_json::from_str(&text)
            .map_err(|err| SoftPosError::Serialization {
                error: format!("unexpected attestation response: {err}"),
            })?;

        self.token_store
            .save(&parsed.transaction_token, &parsed.expires_at)?;
        log::info!(
            "transaction attestation successful, token expires at: {}",
            parsed.expires_at
        );

        Ok(AttestationInfo {
            transaction_token: parsed.transaction_token,
            expires_at: parsed.expires_at,
            device_status: parsed.device_status,
            security_score: parsed.security_score,
        })
    }

    /// Processes a transaction using the held token, consuming it on
    /// success.
    ///
    /// Preconditions, checked in order before any network traffic: a token
    /// must be held, and the device must have a KSN from registration.
    ///
    /// # Errors
    ///
    /// [`SoftPosError::NoTransactionToken`] when no token is held,
    /// [`SoftPosError::DeviceNotProvisioned`] when the KSN is missing. On a
    /// 401/403 the held token is cleared before the error is returned; other
    /// failures leave it intact.
    #[allow(clippy::needless_pass_by_value)]
    pub async fn process_transaction(
        &self,
        base_url: String,
        device_id: String,
        card_number: String,
        amount_minor_units: i64,
        currency: String,
    ) -> Result<TransactionOutcome, SoftPosError> {
        let Some(held) = self.token_store.current()? else {
            return Err(SoftPosError::NoTransactionToken);
        };

        let Some(ksn) = self.device_store.ksn()? else {
            return Err(SoftPosError::DeviceNotProvisioned {
                reason: "no KSN available, register device first".to_string(),
            });
        };

        let (client_ip, fix) = self.location.as_ref().map_or((None, None), |l| {
            (l.client_ip(), l.last_known_location())
        });

        let body = ProcessTransactionRequest {
            device_id,
            transaction_type: "PAYMENT".to_string(),
            amount: amount_minor_units,
            currency,
            encrypted_pin_block: placeholder_pin_block(),
            ksn,
            card_number_masked: mask_card_number(&card_number),
            transaction_token: held.token,
            client_ip,
            latitude: fix.as_ref().map(|f| f.latitude),
            longitude: fix.as_ref().map(|f| f.longitude),
            location_accuracy: fix.as_ref().map(|f| f.accuracy),
            location_timestamp: fix.map(|f| f.timestamp),
        };

        let url = endpoint(&base_url, PROCESS_PATH);
        log::info!("processing transaction with held token");
        let started = Instant::now();
        self.logs.request("POST", &url, &to_json(&body)?);

        let response = match self.request.post(&url, &body).await {
            Ok(response) => response,
            Err(err) => {
                self.logs.error("POST", &url, &err.to_string());
                return Err(SoftPosError::Network {
                    url,
                    error: err.to_string(),
                });
            }
        };

        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        self.logs.response("POST", &url, &text, status, started);

        if status == 401 || status == 403 {
            // The server says the token is invalid or expired; drop it so
            // the next attempt is forced to re-attest.
            self.token_store.clear()?;
            log::warn!("token rejected with status {status}, cleared");
            return Err(SoftPosError::from_status(status, &text));
        }

        if !(200..300).contains(&status) {
            return Err(SoftPosError::from_status(status, &text));
        }

        let parsed: ProcessTransactionResponse = serde_json::from_str(&text)
            .map_err(|err| SoftPosError::Serialization {
                error: format!("unexpected processing response: {err}"),
            })?;

        // Single-use enforced client-side.
        self.token_store.clear()?;
        log::info!("transaction processed: {}", parsed.transaction_id);

        Ok(TransactionOutcome {
            transaction_id: parsed.transaction_id,
            status: parsed.status,
            processed_at: parsed.processed_at,
        })
    }

    /// Runs the full demo flow: attest, a short pause standing in for PIN
    /// entry, then process. Returns one outcome line per step.
    ///
    /// # Errors
    ///
    /// Fails on the first failing step with that step's error.
    pub async fn demonstrate_full_flow(
        &self,
        base_url: String,
        device_id: String,
        card_number: String,
        amount_minor_units: i64,
        currency: String,
    ) -> Result<Vec<String>, SoftPosError> {
        let attestation = self
            .attest_transaction(
                base_url.clone(),
                device_id.clone(),
                amount_minor_units,
                currency.clone(),
            )
            .await?;

        tokio::time::sleep(std::time::Duration::from_secs(1)).await;

        let outcome = self
            .process_transaction(
                base_url,
                device_id,
                card_number,
                amount_minor_units,
                currency,
            )
            .await?;

        Ok(vec![
            format!(
                "Transaction attested, token expires at {}",
                attestation.expires_at
            ),
            format!(
                "Transaction {} {} at {}",
                outcome.transaction_id, outcome.status, outcome.processed_at
            ),
        ])
    }

    /// Returns the currently held token and its expiry, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the token slot cannot be read.
    pub fn held_token(&self) -> Result<Option<StoredToken>, SoftPosError> {
        Ok(self.token_store.current()?)
    }

    /// Explicitly clears the held token.
    ///
    /// # Errors
    ///
    /// Returns an error if the token slot cannot be cleared.
    pub fn clear_token(&self) -> Result<(), SoftPosError> {
        Ok(self.token_store.clear()?)
    }
}

fn to_json<T: serde::Serialize>(body: &T) -> Result<String, SoftPosError> {
    serde_json::to_string(body).map_err(|err| SoftPosError::Serialization {
        error: format!("unexpected error serializing request: {err}"),
    })
}

/// Stand-in for a real DUKPT-encrypted PIN block.
fn placeholder_pin_block() -> String {
    let nonce: [u8; 8] = rand::random();
    format!("SIMULATED_ENCRYPTED_PIN_BLOCK_{}", hex::encode(nonce))
}

/// Masks a card number to its first 6 and last 4 digits. Inputs shorter
/// than 10 characters are returned unchanged.
pub(crate) fn mask_card_number(card_number: &str) -> String {
    let len = card_number.chars().count();
    if len < 10 {
        return card_number.to_string();
    }
    let first: String = card_number.chars().take(6).collect();
    let last: String = card_number.chars().skip(len - 4).collect();
    format!("{first}****{last}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{provisioned_store, MemoryStore};
    use test_case::test_case;

    fn manager(store: Arc<MemoryStore>) -> TransactionTokenManager {
        TransactionTokenManager::new(store, None, None)
    }

    fn attest_body() -> String {
        serde_json::json!({
            "transaction_token": "tok-abc",
            "expires_at": "2026-08-31T12:00:00Z",
            "device_status": "ACTIVE",
            "security_score": 95
        })
        .to_string()
    }

    #[test_case("6222021234567890", "622202****7890"; "sixteen digits")]
    #[test_case("1234567890", "123456****7890"; "ten digits")]
    #[test_case("123456789", "123456789"; "too short is untouched")]
    fn masking(input: &str, expected: &str) {
        assert_eq!(mask_card_number(input), expected);
    }

    #[tokio::test]
    async fn process_without_token_fails_before_any_network_call() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/transactions/process")
            .expect(0)
            .create_async()
            .await;

        let manager = manager(provisioned_store());
        let result = manager
            .process_transaction(
                server.url(),
                "dev-1".to_string(),
                "6222021234567890".to_string(),
                10_000,
                "CNY".to_string(),
            )
            .await;

        assert!(matches!(result, Err(SoftPosError::NoTransactionToken)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn process_without_ksn_fails_with_provisioning_error() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager(Arc::clone(&store));
        TokenStore::new(store).save("tok", "soon").unwrap();

        let result = manager
            .process_transaction(
                "http://127.0.0.1:9".to_string(),
                "dev-1".to_string(),
                "6222021234567890".to_string(),
                10_000,
                "CNY".to_string(),
            )
            .await;
        assert!(matches!(
            result,
            Err(SoftPosError::DeviceNotProvisioned { .. })
        ));
    }

    #[tokio::test]
    async fn attest_persists_token_and_second_attest_overwrites() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v1/transactions/attest")
            .with_status(200)
            .with_body(attest_body())
            .create_async()
            .await;

        let store = provisioned_store();
        let manager = manager(Arc::clone(&store));

        let info = manager
            .attest_transaction(
                server.url(),
                "dev-1".to_string(),
                10_000,
                "CNY".to_string(),
            )
            .await
            .unwrap();
        assert_eq!(info.transaction_token, "tok-abc");
        assert_eq!(info.security_score, 95);

        let held = manager.held_token().unwrap().unwrap();
        assert_eq!(held.token, "tok-abc");

        // a second attestation replaces the slot
        server
            .mock("POST", "/api/v1/transactions/attest")
            .with_status(200)
            .with_body(
                serde_json::json!({
                    "transaction_token": "tok-def",
                    "expires_at": "2026-08-31T12:05:00Z",
                    "device_status": "ACTIVE",
                    "security_score": 90
                })
                .to_string(),
            )
            .create_async()
            .await;
        manager
            .attest_transaction(
                server.url(),
                "dev-1".to_string(),
                10_000,
                "CNY".to_string(),
            )
            .await
            .unwrap();
        assert_eq!(manager.held_token().unwrap().unwrap().token, "tok-def");
    }

    #[tokio::test]
    async fn failed_attest_leaves_slot_untouched() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v1/transactions/attest")
            .with_status(503)
            .with_body("attestation service unavailable")
            .create_async()
            .await;

        let store = provisioned_store();
        TokenStore::new(Arc::clone(&store) as Arc<dyn KeyValueStore>)
            .save("tok-old", "later")
            .unwrap();
        let manager = manager(store);

        let result = manager
            .attest_transaction(
                server.url(),
                "dev-1".to_string(),
                10_000,
                "CNY".to_string(),
            )
            .await;
        match result {
            Err(SoftPosError::Api { status, message }) => {
                assert_eq!(status, 503);
                assert!(message.contains("unavailable"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
        assert_eq!(manager.held_token().unwrap().unwrap().token, "tok-old");
    }

    #[tokio::test]
    async fn successful_process_consumes_the_token() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v1/transactions/attest")
            .with_status(200)
            .with_body(attest_body())
            .create_async()
            .await;
        let process_mock = server
            .mock("POST", "/api/v1/transactions/process")
            .match_request(|req| {
                let body = req.utf8_lossy_body().unwrap();
                body.contains("\"cardNumberMasked\":\"622202****7890\"")
                    && !body.contains("1234567890")
                    && body.contains("\"transactionToken\":\"tok-abc\"")
            })
            .with_status(200)
            .with_body(
                serde_json::json!({
                    "transaction_id": "txn-42",
                    "status": "APPROVED",
                    "processed_at": "2026-08-31T11:59:59Z"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let manager = manager(provisioned_store());
        manager
            .attest_transaction(
                server.url(),
                "dev-1".to_string(),
                10_000,
                "CNY".to_string(),
            )
            .await
            .unwrap();

        let outcome = manager
            .process_transaction(
                server.url(),
                "dev-1".to_string(),
                "6222021234567890".to_string(),
                10_000,
                "CNY".to_string(),
            )
            .await
            .unwrap();
        assert_eq!(outcome.transaction_id, "txn-42");
        assert_eq!(outcome.status, "APPROVED");
        process_mock.assert_async().await;

        // token consumed: a second process attempt fails locally
        assert!(manager.held_token().unwrap().is_none());
        let retry = manager
            .process_transaction(
                server.url(),
                "dev-1".to_string(),
                "6222021234567890".to_string(),
                10_000,
                "CNY".to_string(),
            )
            .await;
        assert!(matches!(retry, Err(SoftPosError::NoTransactionToken)));
    }

    #[tokio::test]
    async fn auth_rejection_clears_the_token() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v1/transactions/attest")
            .with_status(200)
            .with_body(attest_body())
            .create_async()
            .await;
        server
            .mock("POST", "/api/v1/transactions/process")
            .with_status(401)
            .with_body("token expired")
            .create_async()
            .await;

        let manager = manager(provisioned_store());
        manager
            .attest_transaction(
                server.url(),
                "dev-1".to_string(),
                10_000,
                "CNY".to_string(),
            )
            .await
            .unwrap();

        let result = manager
            .process_transaction(
                server.url(),
                "dev-1".to_string(),
                "6222021234567890".to_string(),
                10_000,
                "CNY".to_string(),
            )
            .await;
        assert!(matches!(result, Err(SoftPosError::Api { status: 401, .. })));
        assert!(manager.held_token().unwrap().is_none());
    }

    #[tokio::test]
    async fn ambiguous_failure_keeps_the_token() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v1/transactions/attest")
            .with_status(200)
            .with_body(attest_body())
            .create_async()
            .await;
        server
            .mock("POST", "/api/v1/transactions/process")
            .with_status(500)
            .with_body("internal error")
            .create_async()
            .await;

        let manager = manager(provisioned_store());
        manager
            .attest_transaction(
                server.url(),
                "dev-1".to_string(),
                10_000,
                "CNY".to_string(),
            )
            .await
            .unwrap();

        let result = manager
            .process_transaction(
                server.url(),
                "dev-1".to_string(),
                "6222021234567890".to_string(),
                10_000,
                "CNY".to_string(),
            )
            .await;
        assert!(matches!(result, Err(SoftPosError::Api { status: 500, .. })));
        // could still be valid server-side
        assert!(manager.held_token().unwrap().is_some());
    }
}
