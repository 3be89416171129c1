//! Bridges the Rust `log` facade to a host-provided logger.

use std::sync::{Arc, OnceLock};

/// Logger implemented by the host app to receive log messages.
///
/// Register it once at startup with [`set_logger`]. On Android the usual
/// implementation forwards to `android.util.Log`.
#[uniffi::export(with_foreign)]
pub trait Logger: Sync + Send {
    /// Logs a message at the given level.
    fn log(&self, level: LogLevel, message: String);
}

/// Severity levels forwarded to the host logger.
#[derive(Debug, Clone, uniffi::Enum)]
pub enum LogLevel {
    /// Extremely detailed tracing.
    Trace,
    /// Debugging information.
    Debug,
    /// Progress of normal operation.
    Info,
    /// Potentially harmful situations.
    Warn,
    /// Errors that still allow the client to continue.
    Error,
}

const fn log_level(level: log::Level) -> LogLevel {
    match level {
        log::Level::Error => LogLevel::Error,
        log::Level::Warn => LogLevel::Warn,
        log::Level::Info => LogLevel::Info,
        log::Level::Debug => LogLevel::Debug,
        log::Level::Trace => LogLevel::Trace,
    }
}

/// Forwards `log` records to the registered host logger.
struct ForeignLogger;

impl log::Log for ForeignLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        // Keep debug/trace noise from other crates out of the host log.
        let from_softpos = record
            .module_path()
            .is_some_and(|module_path| module_path.starts_with("softpos"));
        let debug_or_trace = record.level() == log::Level::Debug
            || record.level() == log::Level::Trace;
        if debug_or_trace && !from_softpos {
            return;
        }

        if let Some(logger) = LOGGER_INSTANCE.get() {
            logger.log(log_level(record.level()), format!("{}", record.args()));
        } else {
            eprintln!("Logger not set: {}", record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER_INSTANCE: OnceLock<Arc<dyn Logger>> = OnceLock::new();

/// Registers the host logger and installs the `log` bridge.
///
/// Call once at startup; later calls are ignored.
#[uniffi::export]
pub fn set_logger(logger: Arc<dyn Logger>) {
    if LOGGER_INSTANCE.set(logger).is_err() {
        log::warn!("logger already set");
        return;
    }

    if let Err(e) = init_logger() {
        eprintln!("Failed to set logger: {e}");
    }
}

fn init_logger() -> Result<(), log::SetLoggerError> {
    static LOGGER: ForeignLogger = ForeignLogger;
    log::set_logger(&LOGGER)?;
    log::set_max_level(log::LevelFilter::Trace);
    Ok(())
}
