//! Telemetry and audit logging for proxy-verify.
//!
//! This module provides structured logging to syslog with the `PROXY_VERIFY` tag.
//! Each verification run emits a start event, stage events and an end event.
//!
//! # Architecture
//!
//! - **Audit logging** (syslog): Run events go to syslog, never stdout/stderr
//! - **Debug logging** (tracing): Development logs go to stderr via `tracing`
//! - These are completely separate concerns
//!
//! # Usage
//!
//! ```ignore
//! use proxy_verify::telemetry::{self, AuditEvent};
//!
//! // Initialize at startup
//! telemetry::init_logger()?;
//!
//! // Log events throughout the application
//! telemetry::audit().log(AuditEvent::VerificationStart {
//!     user: "operator".to_string(),
//!     server_config: "/usr/local/etc/xray/config.json".to_string(),
//!     pid: std::process::id(),
//! });
//! ```
//!
//! # Event Format
//!
//! Events are logged as JSON with an ISO8601 timestamp:
//!
//! ```json
//! {"ts":"2026-01-07T14:32:01Z","event":"verification_start","user":"operator","server_config":"/usr/local/etc/xray/config.json","pid":12345}
//! ```

mod error;
mod events;
mod syslog;

pub use error::TelemetryError;
pub use events::{AuditEvent, Outcome};
pub use syslog::{audit, init_logger, init_null_logger, try_audit, AuditLogger, SYSLOG_TAG};
