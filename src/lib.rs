//! proxy-verify: end-to-end verification of an Xray proxy server configuration
//!
//! This crate checks that a server configuration is well-formed, derives a
//! minimal shadowsocks client for it, runs that client just long enough to
//! confirm it starts, and probes an egress-identity service.
//!
//! # Architecture
//!
//! - **Xray**: Server document model, aggregating validator and client derivation
//! - **Supervisor**: Client process launch, readiness detection and termination
//! - **Probe**: One-shot HTTP GET, direct or through the client's local proxy
//! - **Orchestrator**: The stage pipeline and its stage-tagged errors
//! - **Config**: Hierarchical TOML settings
//! - **Telemetry**: Structured syslog logging for audit trails

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod cli;
pub mod cli_handler;
pub mod config;
pub mod orchestrator;
pub mod probe;
pub mod report;
pub mod supervisor;
pub mod telemetry;
pub mod xray;
