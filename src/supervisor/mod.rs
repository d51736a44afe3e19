//! Supervision of the short-lived verification client.
//!
//! # Lifecycle
//!
//! ```text
//! NotStarted ──spawn──> Starting ──marker/close/deadline──> Ready | StartupFailed | StartupTimedOut
//!                                                              │
//!                                               (probe if Ready)
//!                                                              ▼
//!                                          Terminating ──SIGTERM, grace, SIGKILL──> Terminated
//! ```
//!
//! [`Supervisor::spawn`] launches the client through an injected
//! [`ProcessLauncher`] and starts a background scanner on its stdout. The
//! returned [`ReadinessWatch`] resolves once, and [`ClientProcess::terminate`]
//! must be called on every path after a successful spawn.

pub mod error;
pub mod handle;
pub mod launcher;
pub mod readiness;

pub use error::SupervisorError;
pub use handle::ClientProcess;
pub use launcher::{ProcessLauncher, XrayLauncher};
pub use readiness::{Readiness, ReadinessWatch, StartupMarkers, StartupOutcome};

use std::path::Path;
use std::sync::Arc;

use tokio::io::BufReader;
use tokio::sync::oneshot;
use tracing::{info, warn};

/// Launches clients and wires up readiness detection.
#[derive(Clone)]
pub struct Supervisor {
    launcher: Arc<dyn ProcessLauncher>,
    markers: StartupMarkers,
}

impl Supervisor {
    /// Create a supervisor that launches through `launcher`.
    pub fn new(launcher: Arc<dyn ProcessLauncher>, markers: StartupMarkers) -> Self {
        Self { launcher, markers }
    }

    /// Launch the client and start scanning its stdout.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        &self,
        binary: &Path,
        config_path: &Path,
    ) -> Result<(ClientProcess, ReadinessWatch), SupervisorError> {
        let mut child = self
            .launcher
            .launch(binary, config_path)
            .map_err(|source| SupervisorError::Spawn {
                binary: binary.to_path_buf(),
                source,
            })?;

        let Some(stdout) = child.stdout.take() else {
            warn!("Launcher returned {:?} without piped stdout, killing it", binary);
            if let Err(e) = child.start_kill() {
                warn!("Failed to kill client without stdout: {}", e);
            }
            return Err(SupervisorError::NoStdout);
        };
        let pid = child.id();

        let (tx, rx) = oneshot::channel();
        let scanner = tokio::spawn(readiness::scan_output(
            BufReader::new(stdout),
            self.markers.clone(),
            tx,
        ));

        info!("Client started: {:?} (pid {:?})", binary, pid);
        Ok((ClientProcess { child, scanner, pid }, ReadinessWatch::new(rx)))
    }
}
