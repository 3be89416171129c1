//! Best-effort threat reporting with an in-memory retry queue and a
//! periodic background scan.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

use crate::api::{ThreatReportRequest, ThreatReportResponse};
use crate::api_log::{ApiLogSink, ApiLogger};
use crate::error::SoftPosError;
use crate::http::{endpoint, Request};
use crate::platform::DeviceSignals;
use crate::storage::{DeviceStore, KeyValueStore};
use crate::threat::{ThreatDetector, ThreatFinding};

const REPORT_PATH: &str = "api/v1/threats/report";
const AUTO_SCAN_INTERVAL: Duration = Duration::from_secs(300);

/// Detects local integrity threats and delivers reports to the backend.
///
/// Failed reports land on an unbounded in-memory FIFO queue and are retried
/// by the background scan loop. The queue is deliberately not durable: it is
/// lost on process death.
#[derive(uniffi::Object)]
pub struct ThreatReporter {
    inner: Arc<Inner>,
}

struct Inner {
    detector: ThreatDetector,
    device_store: DeviceStore,
    request: Request,
    pending: Mutex<VecDeque<ThreatReportRequest>>,
    logs: ApiLogger,
    auto_scan: Mutex<Option<JoinHandle<()>>>,
}

#[uniffi::export(async_runtime = "tokio")]
impl ThreatReporter {
    /// Creates a reporter over the host store and signal source, with an
    /// optional activity log sink.
    #[must_use]
    #[uniffi::constructor]
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        signals: Arc<dyn DeviceSignals>,
        log_sink: Option<Arc<dyn ApiLogSink>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                detector: ThreatDetector::new(signals),
                device_store: DeviceStore::new(store),
                request: Request::new(),
                pending: Mutex::new(VecDeque::new()),
                logs: ApiLogger::new(log_sink),
                auto_scan: Mutex::new(None),
            }),
        }
    }

    /// Reports a single finding to the backend.
    ///
    /// On a bad status or transport failure the report is queued for
    /// autonomous retry and the immediate failure is still returned to the
    /// caller.
    ///
    /// # Errors
    ///
    /// [`SoftPosError::DeviceNotRegistered`] when no device id is stored
    /// (nothing is queued or sent), otherwise the network or backend error.
    #[allow(clippy::needless_pass_by_value)]
    pub async fn report_threat(
        &self,
        base_url: String,
        finding: ThreatFinding,
    ) -> Result<String, SoftPosError> {
        self.inner.report(&base_url, &finding).await
    }

    /// Runs a threat scan and reports every detected finding sequentially.
    ///
    /// Returns one outcome line per finding, or exactly
    /// `"No threats detected"` when the scan is clean (in which case no HTTP
    /// calls are made). Individual report failures are captured in the
    /// outcome text; the aggregate call itself succeeds.
    ///
    /// # Errors
    ///
    /// Currently never fails: store and report errors are folded into the
    /// per-finding outcome text. The `Result` keeps the exported surface
    /// uniform.
    #[allow(clippy::needless_pass_by_value)]
    pub async fn scan_and_report(
        &self,
        base_url: String,
    ) -> Result<Vec<String>, SoftPosError> {
        self.inner.scan_and_report(&base_url).await
    }

    /// Starts the periodic background scan-and-retry loop, replacing any
    /// previous one. Every 5 minutes the loop scans, reports, then drains
    /// the retry queue; per-iteration errors are swallowed and the full
    /// interval is slept regardless of how long the pass took.
    // async so the spawned loop lands on the exporting runtime
    #[allow(clippy::unused_async)]
    pub async fn start_auto_scanning(&self, base_url: String) {
        let inner = Arc::clone(&self.inner);
        inner.logs.info(
            "SCAN",
            "local://auto-scan",
            &format!(
                "Automatic threat scanning started (interval: {}s)",
                AUTO_SCAN_INTERVAL.as_secs()
            ),
        );
        log::info!("auto threat scanning started");

        // The previous loop must be gone before the replacement spawns, so
        // two loops never scan concurrently during the swap.
        let mut guard = lock(&inner.auto_scan);
        if let Some(previous) = guard.take() {
            previous.abort();
        }

        let loop_inner = Arc::clone(&inner);
        *guard = Some(tokio::spawn(async move {
            loop {
                if let Err(err) = loop_inner.scan_pass(&base_url).await {
                    log::error!("auto scan pass failed: {err}");
                }
                tokio::time::sleep(AUTO_SCAN_INTERVAL).await;
            }
        }));
    }

    /// Stops the background loop. Idempotent.
    pub fn stop_auto_scanning(&self) {
        if let Some(handle) = lock(&self.inner.auto_scan).take() {
            handle.abort();
        }
        log::info!("auto threat scanning stopped");
    }

    /// Number of reports currently waiting for retry.
    #[must_use]
    pub fn pending_count(&self) -> u64 {
        lock(&self.inner.pending).len() as u64
    }

    /// One-line threat summary for the host UI.
    #[must_use]
    pub fn threat_status(&self) -> String {
        let threats = self.inner.detector.detected_threats();
        if threats.is_empty() {
            return "\u{2713} No threats detected".to_string();
        }
        self.inner.detector.highest_severity_threat().map_or_else(
            || format!("\u{26a0} {} threat(s) detected", threats.len()),
            |highest| {
                format!(
                    "\u{26a0} {} threat(s) detected - Highest: {}",
                    threats.len(),
                    highest.severity
                )
            },
        )
    }
}

impl Inner {
    async fn report(
        &self,
        base_url: &str,
        finding: &ThreatFinding,
    ) -> Result<String, SoftPosError> {
        let Some(device_id) = self.device_store.device_id()? else {
            return Err(SoftPosError::DeviceNotRegistered);
        };

        let body = ThreatReportRequest::new(
            &device_id,
            finding.threat_type,
            finding.severity,
            &finding.description,
        );
        self.post_report(base_url, body, true).await
    }

    /// Posts one report. On failure the request is queued for retry when
    /// `queue_on_failure` is set (first attempts queue, retry passes
    /// re-append themselves explicitly).
    async fn post_report(
        &self,
        base_url: &str,
        body: ThreatReportRequest,
        queue_on_failure: bool,
    ) -> Result<String, SoftPosError> {
        let url = endpoint(base_url, REPORT_PATH);
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
                log::error!("threat report transport failure: {err}");
                if queue_on_failure {
                    lock(&self.pending).push_back(body);
                }
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
            log::error!("threat report rejected with status {status}");
            if queue_on_failure {
                lock(&self.pending).push_back(body);
            }
            return Err(SoftPosError::from_status(status, &text));
        }

        log::info!("threat reported: {}", body.threat_type);
        let message = serde_json::from_str::<ThreatReportResponse>(&text)
            .map_or_else(
                |_| "Threat reported successfully".to_string(),
                |parsed| parsed.message,
            );
        Ok(message)
    }

    async fn scan_and_report(
        &self,
        base_url: &str,
    ) -> Result<Vec<String>, SoftPosError> {
        let detected = self.detector.detected_threats();
        if detected.is_empty() {
            self.logs
                .info("SCAN", "local://threat-scan", "No threats detected");
            return Ok(vec!["No threats detected".to_string()]);
        }

        let mut outcomes = Vec::with_capacity(detected.len());
        for finding in detected {
            let outcome = match self.report(base_url, &finding).await {
                Ok(message) => format!("{}: {message}", finding.threat_type),
                Err(err) => format!("{}: Failed - {err}", finding.threat_type),
            };
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// One full background iteration: scan, report, then retry the queue.
    async fn scan_pass(&self, base_url: &str) -> Result<(), SoftPosError> {
        self.scan_and_report(base_url).await?;
        self.retry_pending(base_url).await;
        Ok(())
    }

    /// Drains the current queue contents into a snapshot and attempts each
    /// item once; items that still fail go back to the tail of the live
    /// queue. The queue may grow again concurrently from new failures.
    async fn retry_pending(&self, base_url: &str) {
        let snapshot: Vec<ThreatReportRequest> =
            lock(&self.pending).drain(..).collect();
        if snapshot.is_empty() {
            return;
        }

        log::info!("retrying {} pending threat reports", snapshot.len());
        self.logs.info(
            "RETRY",
            "local://retry-queue",
            &format!("Retrying {} pending threats", snapshot.len()),
        );

        for body in snapshot {
            if self
                .post_report(base_url, body.clone(), false)
                .await
                .is_err()
            {
                lock(&self.pending).push_back(body);
            }
        }
    }
}

/// Locks a mutex, recovering from poisoning; queue state stays usable even
/// if a holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
