//! Handle to a running verification client.

use std::process::ExitStatus;
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::process::Child;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::error::SupervisorError;

/// Handle to a running client process and its output scanner.
pub struct ClientProcess {
    pub(crate) child: Child,
    pub(crate) scanner: JoinHandle<()>,
    /// PID of the client process.
    pub pid: Option<u32>,
}

impl ClientProcess {
    /// Send a signal to the client process.
    pub fn signal(&self, signal: Signal) -> Result<(), SupervisorError> {
        let Some(pid) = self.pid else {
            return Ok(());
        };
        match kill(Pid::from_raw(pid as i32), signal) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(SupervisorError::SignalFailed(e)),
        }
    }

    /// Check if the client is still running.
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Get the exit status if available without blocking.
    pub fn try_wait(&mut self) -> Result<Option<ExitStatus>, SupervisorError> {
        self.child.try_wait().map_err(SupervisorError::WaitFailed)
    }

    /// Stop the client: SIGTERM, wait up to `grace`, then SIGKILL.
    ///
    /// Consumes the handle; the process has exited once this returns `Ok`.
    pub async fn terminate(mut self, grace: Duration) -> Result<ExitStatus, SupervisorError> {
        if let Some(status) = self.try_wait()? {
            debug!("Client already exited with {}", status);
            self.scanner.abort();
            return Ok(status);
        }

        debug!("Sending SIGTERM to client pid {:?}", self.pid);
        self.signal(Signal::SIGTERM)?;

        let status = match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(result) => result.map_err(SupervisorError::WaitFailed)?,
            Err(_) => {
                warn!(
                    "Client pid {:?} still running {:?} after SIGTERM, sending SIGKILL",
                    self.pid, grace
                );
                self.child.kill().await.map_err(SupervisorError::KillFailed)?;
                self.child.wait().await.map_err(SupervisorError::WaitFailed)?
            }
        };

        self.scanner.abort();
        info!("Client stopped ({})", status);
        Ok(status)
    }
}
