//! Request/response activity log shown in the host UI's split-pane view.

use std::sync::Arc;
use std::time::Instant;

/// What a log entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum ApiLogKind {
    /// An outgoing request.
    Request,
    /// A received response.
    Response,
    /// A transport-level failure.
    Error,
    /// Informational entries (scan started, retry pass, ...).
    Info,
}

/// One entry in the API activity log.
#[derive(Debug, Clone, uniffi::Record)]
pub struct ApiLogEntry {
    /// Local wall-clock timestamp, `HH:mm:ss.SSS`.
    pub timestamp: String,
    /// Entry kind.
    pub kind: ApiLogKind,
    /// HTTP method, or a pseudo-method such as `SCAN`.
    pub method: String,
    /// Request URL, or a pseudo-URL such as `local://threat-scan`.
    pub url: String,
    /// Request/response body or error text. Card numbers only ever appear
    /// here in masked form.
    pub body: String,
    /// HTTP status code for responses.
    pub status_code: Option<u16>,
    /// Round-trip duration in milliseconds for responses.
    pub duration_ms: Option<u64>,
}

/// Sink the host UI implements to render the activity log.
#[uniffi::export(with_foreign)]
pub trait ApiLogSink: Send + Sync {
    /// Receives one log entry. Called from background tasks; implementations
    /// must hop to the UI thread themselves.
    fn log(&self, entry: ApiLogEntry);
}

fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S%.3f").to_string()
}

/// Internal helper that formats and forwards entries to an optional sink.
#[derive(Clone)]
pub(crate) struct ApiLogger {
    sink: Option<Arc<dyn ApiLogSink>>,
}

impl ApiLogger {
    pub(crate) const fn new(sink: Option<Arc<dyn ApiLogSink>>) -> Self {
        Self { sink }
    }

    fn emit(&self, entry: ApiLogEntry) {
        if let Some(sink) = &self.sink {
            sink.log(entry);
        }
    }

    pub(crate) fn request(&self, method: &str, url: &str, body: &str) {
        self.emit(ApiLogEntry {
            timestamp: timestamp(),
            kind: ApiLogKind::Request,
            method: method.to_string(),
            url: url.to_string(),
            body: body.to_string(),
            status_code: None,
            duration_ms: None,
        });
    }

    pub(crate) fn response(
        &self,
        method: &str,
        url: &str,
        body: &str,
        status: u16,
        started: Instant,
    ) {
        self.emit(ApiLogEntry {
            timestamp: timestamp(),
            kind: ApiLogKind::Response,
            method: method.to_string(),
            url: url.to_string(),
            body: body.to_string(),
            status_code: Some(status),
            duration_ms: Some(duration_ms(started)),
        });
    }

    pub(crate) fn error(&self, method: &str, url: &str, error: &str) {
        self.emit(ApiLogEntry {
            timestamp: timestamp(),
            kind: ApiLogKind::Error,
            method: method.to_string(),
            url: url.to_string(),
            body: error.to_string(),
            status_code: None,
            duration_ms: None,
        });
    }

    pub(crate) fn info(&self, method: &str, url: &str, body: &str) {
        self.emit(ApiLogEntry {
            timestamp: timestamp(),
            kind: ApiLogKind::Info,
            method: method.to_string(),
            url: url.to_string(),
            body: body.to_string(),
            status_code: None,
            duration_ms: None,
        });
    }
}

#[allow(clippy::cast_possible_truncation)]
fn duration_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
