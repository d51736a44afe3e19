//! Verification pipeline orchestration.
//!
//! ```text
//! load ─> validate ─> derive ─> write client config ─> startup ─> probe
//!                                                        │          │
//!                                                        └──────────┴──> shutdown (always, once launched)
//! ```
//!
//! Each stage either hands its output to the next or fails the run with a
//! [`RunError`] naming the stage. Once the client has been launched it is
//! terminated on every path, and a startup or probe failure takes precedence
//! over a shutdown failure in the reported error.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::{self, ConfigError, Settings};
use crate::probe::{ConnectivityProbe, EgressInfo, ProbeError, ProbeRoute};
use crate::report::VerificationReport;
use crate::supervisor::{ProcessLauncher, StartupMarkers, StartupOutcome, Supervisor, SupervisorError};
use crate::telemetry::{self, AuditEvent, AuditLogger, Outcome};
use crate::xray::{
    self, derive_client_config, ClientConfig, ClientParams, DerivationInvariantViolation,
    ServerConfig, ValidationError,
};

/// Exit code for a run that failed a stage.
pub const EXIT_FAILURE: u8 = 1;

/// Exit code for a pipeline defect (`EX_SOFTWARE`).
pub const EXIT_DEFECT: u8 = 70;

/// Pipeline stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    /// Reading settings and the server document.
    Load,
    /// Validating the server document.
    Validate,
    /// Deriving the client configuration.
    Derive,
    /// Writing the client configuration.
    WriteClientConfig,
    /// Launching the client and waiting for readiness.
    Startup,
    /// Probing connectivity.
    Probe,
    /// Stopping the client.
    Shutdown,
}

impl Stage {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::Validate => "validate",
            Stage::Derive => "derive",
            Stage::WriteClientConfig => "write-client-config",
            Stage::Startup => "startup",
            Stage::Probe => "probe",
            Stage::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Underlying cause of a stage failure.
#[derive(Debug, Error)]
pub enum StageError {
    /// Settings or document loading failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The server document has violations.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Derivation saw input that validation should have rejected.
    #[error(transparent)]
    Invariant(#[from] DerivationInvariantViolation),

    /// The client configuration could not be written.
    #[error("Failed to write client config {path:?}: {source}")]
    WriteClientConfig {
        /// Destination path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Client launch, readiness or shutdown failed.
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    /// The probe failed.
    #[error(transparent)]
    Probe(#[from] ProbeError),
}

/// The single error reported for a failed run.
#[derive(Debug, Error)]
#[error("{stage} stage failed: {source}")]
pub struct RunError {
    /// Stage that failed.
    pub stage: Stage,
    /// What went wrong.
    #[source]
    pub source: StageError,
}

impl RunError {
    /// Attribute `source` to `stage`.
    pub fn new(stage: Stage, source: impl Into<StageError>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }

    /// Whether this is a calling-sequence defect rather than a user error.
    pub fn is_defect(&self) -> bool {
        matches!(self.source, StageError::Invariant(_))
    }

    /// Process exit code for this failure.
    pub fn exit_code(&self) -> u8 {
        if self.is_defect() {
            EXIT_DEFECT
        } else {
            EXIT_FAILURE
        }
    }

    /// Client output attached to a startup failure.
    pub fn client_output(&self) -> Option<&str> {
        match &self.source {
            StageError::Supervisor(e) => e.output(),
            _ => None,
        }
    }
}

/// Runs the verification pipeline for one set of settings.
pub struct Verifier {
    settings: Settings,
    supervisor: Supervisor,
    audit: &'static AuditLogger,
}

impl Verifier {
    /// Create a verifier that launches the client through `launcher`.
    pub fn new(settings: Settings, launcher: Arc<dyn ProcessLauncher>) -> Self {
        let markers = StartupMarkers::new(
            settings.markers.started.clone(),
            settings.markers.failed.clone(),
        );
        Self {
            supervisor: Supervisor::new(launcher, markers),
            settings,
            audit: telemetry::audit(),
        }
    }

    /// Log audit events to `audit` instead of the global logger.
    pub fn with_audit(mut self, audit: &'static AuditLogger) -> Self {
        self.audit = audit;
        self
    }

    /// Settings this verifier runs with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Load and validate the server configuration.
    pub fn check(&self) -> Result<ServerConfig, RunError> {
        let path = self
            .settings
            .server_config_path()
            .map_err(|e| RunError::new(Stage::Load, e))?;
        let server = config::load_server_config(path).map_err(|e| RunError::new(Stage::Load, e))?;
        debug!(
            "Parsed server config {:?}: {} inbound(s), {} outbound(s)",
            path,
            server.inbounds.len(),
            server.outbounds.len()
        );

        if let Err(e) = xray::validate(&server, &self.settings.server.protocol) {
            warn!("Server config {:?} has {} violation(s)", path, e.len());
            self.audit.log(AuditEvent::ValidationFailed {
                server_config: path.display().to_string(),
                violations: e.len(),
                paths: e.violations().iter().map(|v| v.path.clone()).collect(),
            });
            return Err(RunError::new(Stage::Validate, e));
        }

        info!("Server config {:?} passed validation", path);
        Ok(server)
    }

    /// Load, validate and derive the client configuration.
    pub fn derive(&self) -> Result<ClientConfig, RunError> {
        let server = self.check()?;
        self.derive_from(&server)
    }

    fn derive_from(&self, server: &ServerConfig) -> Result<ClientConfig, RunError> {
        let params = ClientParams {
            server_protocol: self.settings.server.protocol.clone(),
            server_address: self.settings.server.address.clone(),
            local_port: self.settings.client.local_port,
            log_level: self.settings.client.log_level.clone(),
        };

        derive_client_config(server, &params).map_err(|e| {
            error!("Derivation invariant violated after validation (defect): {}", e);
            RunError::new(Stage::Derive, e)
        })
    }

    /// Run the full pipeline.
    pub async fn run(&self) -> Result<VerificationReport, RunError> {
        let clock = Instant::now();

        self.audit.log(AuditEvent::VerificationStart {
            user: whoami(),
            server_config: self
                .settings
                .server
                .config_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            pid: std::process::id(),
        });

        let result = self.run_stages(clock).await;

        let duration_ms = clock.elapsed().as_millis() as u64;
        let (outcome, stage) = match &result {
            Ok(_) => (Outcome::Success, None),
            Err(e) if e.is_defect() => (Outcome::Defect, Some(e.stage.to_string())),
            Err(e) => (Outcome::Failure, Some(e.stage.to_string())),
        };
        self.audit.log(AuditEvent::VerificationEnd {
            outcome,
            stage,
            duration_ms,
        });

        result
    }

    async fn run_stages(&self, clock: Instant) -> Result<VerificationReport, RunError> {
        let started_at = Utc::now();
        let settings = &self.settings;

        let server = self.check()?;
        let server_config = settings
            .server_config_path()
            .map_err(|e| RunError::new(Stage::Load, e))?
            .clone();
        let client = self.derive_from(&server)?;

        let client_path = settings.client_config_path();
        client.write_atomic(&client_path).map_err(|source| {
            RunError::new(
                Stage::WriteClientConfig,
                StageError::WriteClientConfig {
                    path: client_path.clone(),
                    source,
                },
            )
        })?;

        let binary = config::resolve_client_binary(&settings.client.binary)
            .map_err(|e| RunError::new(Stage::Startup, e))?;
        let (process, readiness) = self
            .supervisor
            .spawn(&binary, &client_path)
            .map_err(|e| RunError::new(Stage::Startup, e))?;
        let pid = process.pid;

        let startup_timeout = settings.startup_timeout();
        let probed = match readiness.wait(startup_timeout).await {
            StartupOutcome::Ready { .. } => {
                info!("Client ready (pid {:?})", pid);
                self.audit.log(AuditEvent::ClientStarted {
                    binary: binary.display().to_string(),
                    pid,
                    local_port: settings.client.local_port,
                });
                self.probe().await
            }
            StartupOutcome::Failed { reason, output } => {
                warn!("Client failed to start: {}", reason);
                Err(RunError::new(
                    Stage::Startup,
                    SupervisorError::StartupFailed { reason, output },
                ))
            }
            StartupOutcome::TimedOut => {
                warn!("Client not ready after {:?}", startup_timeout);
                Err(RunError::new(
                    Stage::Startup,
                    SupervisorError::StartupTimedOut {
                        timeout: startup_timeout,
                    },
                ))
            }
        };

        let stopped = process.terminate(settings.shutdown_grace()).await;

        let body = probed?;
        stopped.map_err(|e| RunError::new(Stage::Shutdown, e))?;

        Ok(VerificationReport {
            started_at,
            duration_ms: clock.elapsed().as_millis() as u64,
            server_config,
            client_config: client_path,
            client_binary: binary,
            probe_url: settings.probe.url.clone(),
            via_proxy: settings.via_proxy(),
            egress: EgressInfo::from_body(&body),
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }

    async fn probe(&self) -> Result<Bytes, RunError> {
        let settings = &self.settings;
        let route = if settings.via_proxy() {
            ProbeRoute::local_port(settings.client.local_port)
        } else {
            ProbeRoute::Direct
        };

        let probe = ConnectivityProbe::new(settings.probe_timeout(), route)
            .map_err(|e| RunError::new(Stage::Probe, e))?;
        let result = probe.probe(&settings.probe.url).await;

        let (bytes, egress_ip, error) = match &result {
            Ok(body) => (
                Some(body.len()),
                EgressInfo::from_body(body).and_then(|e| e.ip),
                None,
            ),
            Err(e) => (None, None, Some(e.to_string())),
        };
        self.audit.log(AuditEvent::ProbeCompleted {
            url: settings.probe.url.clone(),
            via_proxy: settings.via_proxy(),
            bytes,
            egress_ip,
            error,
        });

        result.map_err(|e| RunError::new(Stage::Probe, e))
    }
}

/// Get the current username for audit logging.
fn whoami() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}
