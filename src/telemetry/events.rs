//! Audit event types for structured logging.
//!
//! These events are logged to syslog with the `PROXY_VERIFY` tag so that
//! verification history can be collected centrally.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Audit events for a verification run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// A verification run started.
    VerificationStart {
        /// Username of the person running the verifier.
        user: String,
        /// Server configuration under verification.
        server_config: String,
        /// Process ID of the verifier.
        pid: u32,
    },

    /// The server configuration failed validation.
    ValidationFailed {
        /// Server configuration that was rejected.
        server_config: String,
        /// Number of violations.
        violations: usize,
        /// Location of each violation.
        paths: Vec<String>,
    },

    /// The verification client signalled readiness.
    ClientStarted {
        /// Client binary.
        binary: String,
        /// Client process ID.
        pid: Option<u32>,
        /// Local HTTP proxy port.
        local_port: u16,
    },

    /// The connectivity probe finished.
    ProbeCompleted {
        /// Probe target.
        url: String,
        /// Whether the probe used the client's local proxy.
        via_proxy: bool,
        /// Body size on success.
        bytes: Option<usize>,
        /// Egress address reported by the target, if recognised.
        egress_ip: Option<String>,
        /// Error text on failure.
        error: Option<String>,
    },

    /// A verification run ended.
    VerificationEnd {
        /// How the run ended.
        outcome: Outcome,
        /// Stage that failed, if any.
        stage: Option<String>,
        /// Wall-clock duration of the run in milliseconds.
        duration_ms: u64,
    },
}

/// Result class of a verification run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Traffic flowed through the verified configuration.
    Success,
    /// A stage failed.
    Failure,
    /// The pipeline was driven out of sequence.
    Defect,
}

/// Wrapper for serializing events with timestamp.
#[derive(Debug, Clone, Serialize)]
pub struct TimestampedEvent<'a> {
    /// ISO8601 timestamp.
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,

    /// The actual event (flattened into this struct).
    #[serde(flatten)]
    pub event: &'a AuditEvent,
}

impl AuditEvent {
    /// Wrap this event with a timestamp for serialization.
    pub fn with_timestamp(&self) -> TimestampedEvent<'_> {
        TimestampedEvent {
            timestamp: Utc::now(),
            event: self,
        }
    }
}
