//! Syslog integration for audit logging.
//!
//! All audit events are logged to syslog with the `PROXY_VERIFY` tag.
//! Hosts without a syslog daemon fall back to a null logger.

use std::sync::{Mutex, OnceLock};

use syslog::{Facility, Formatter3164};
use tracing::{debug, error};

use super::error::TelemetryError;
use super::events::AuditEvent;

/// Syslog tag for all audit events.
pub const SYSLOG_TAG: &str = "PROXY_VERIFY";

/// Global audit logger instance.
static AUDIT_LOGGER: OnceLock<AuditLogger> = OnceLock::new();

/// Logger handed out before initialization.
static NULL_LOGGER: AuditLogger = AuditLogger { writer: None };

/// Sends verification audit events to the local syslog daemon.
///
/// Shared through a `static`, so the writer sits behind a `Mutex`.
pub struct AuditLogger {
    /// `None` for the null logger.
    writer: Option<Mutex<syslog::Logger<syslog::LoggerBackend, Formatter3164>>>,
}

impl AuditLogger {
    /// Connect to the local daemon over its Unix socket, tagging lines
    /// `PROXY_VERIFY[pid]`.
    pub fn new() -> Result<Self, TelemetryError> {
        let formatter = Formatter3164 {
            facility: Facility::LOG_USER,
            hostname: None,
            process: SYSLOG_TAG.to_string(),
            pid: std::process::id(),
        };

        let writer =
            syslog::unix(formatter).map_err(|e| TelemetryError::SyslogConnection(e.to_string()))?;

        debug!("Connected to syslog with tag '{}'", SYSLOG_TAG);
        Ok(Self {
            writer: Some(Mutex::new(writer)),
        })
    }

    /// A logger that drops every event.
    pub const fn new_null() -> Self {
        Self { writer: None }
    }

    /// Send `event` to syslog at INFO as one JSON line with a `ts` field.
    ///
    /// Failures are reported through `tracing` and never reach the caller.
    pub fn log(&self, event: AuditEvent) {
        let Some(writer) = &self.writer else {
            return;
        };

        let line = match encode(&event) {
            Ok(line) => line,
            Err(e) => {
                error!("Cannot encode audit event {:?}: {}", event, e);
                return;
            }
        };

        let sent = match writer.lock() {
            Ok(mut logger) => logger.info(&line).map_err(|e| e.to_string()),
            Err(_) => Err("syslog writer lock poisoned".to_string()),
        };
        match sent {
            Ok(()) => debug!("Audit event sent: {}", line),
            Err(e) => error!("Audit event dropped: {}", e),
        }
    }

    /// Check if this is a null logger.
    pub fn is_null(&self) -> bool {
        self.writer.is_none()
    }
}

/// Render an event as its syslog payload.
fn encode(event: &AuditEvent) -> Result<String, serde_json::Error> {
    serde_json::to_string(&event.with_timestamp())
}

/// Initialize the global audit logger.
///
/// This must be called once at startup before any audit logging.
/// Returns an error if syslog connection fails or if already initialized.
pub fn init_logger() -> Result<(), TelemetryError> {
    let logger = AuditLogger::new()?;
    install(logger)
}

/// Initialize the global audit logger as a null logger.
pub fn init_null_logger() -> Result<(), TelemetryError> {
    install(AuditLogger::new_null())
}

fn install(logger: AuditLogger) -> Result<(), TelemetryError> {
    AUDIT_LOGGER
        .set(logger)
        .map_err(|_| TelemetryError::AlreadyInitialized)
}

/// Get a reference to the global audit logger.
///
/// Returns a null logger if `init_logger()` was not called.
pub fn audit() -> &'static AuditLogger {
    AUDIT_LOGGER.get().unwrap_or(&NULL_LOGGER)
}

/// Try to get a reference to the global audit logger.
///
/// Returns None if `init_logger()` was not called.
pub fn try_audit() -> Option<&'static AuditLogger> {
    AUDIT_LOGGER.get()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syslog_tag() {
        assert_eq!(SYSLOG_TAG, "PROXY_VERIFY");
    }

    #[test]
    fn test_uninitialized_audit_is_null() {
        if try_audit().is_none() {
            assert!(audit().is_null());
        }
    }

    #[test]
    fn test_null_logger_discards() {
        let logger = AuditLogger::new_null();
        assert!(logger.is_null());
        logger.log(AuditEvent::VerificationEnd {
            outcome: crate::telemetry::Outcome::Success,
            stage: None,
            duration_ms: 1,
        });
    }

    #[test]
    fn test_encode_tags_and_timestamps() {
        let line = encode(&AuditEvent::ClientStarted {
            binary: "/usr/local/bin/xray".to_string(),
            pid: Some(4242),
            local_port: 10808,
        })
        .unwrap();

        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["event"], "client_started");
        assert_eq!(value["local_port"], 10808);
        assert!(value["ts"].is_string());
    }

    #[test]
    #[ignore = "needs a local syslog socket"]
    fn test_syslog_round() {
        let logger = AuditLogger::new().unwrap();
        assert!(!logger.is_null());
        logger.log(AuditEvent::VerificationStart {
            user: "operator".to_string(),
            server_config: "/usr/local/etc/xray/config.json".to_string(),
            pid: 12345,
        });
    }
}
