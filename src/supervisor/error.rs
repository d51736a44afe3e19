//! Error types for client process supervision.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while launching, awaiting or stopping the client process.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The client binary could not be launched.
    #[error("Failed to launch client {binary:?}: {source}")]
    Spawn {
        /// Binary that was launched.
        binary: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The launched process has no captured stdout.
    #[error("Client process was launched without a stdout pipe")]
    NoStdout,

    /// The client reported a startup failure or exited before becoming ready.
    #[error("Client failed to start: {reason}")]
    StartupFailed {
        /// Why startup is considered failed.
        reason: String,
        /// Client stdout collected up to the failure.
        output: String,
    },

    /// No readiness marker was seen before the deadline.
    #[error("Client did not signal readiness within {timeout:?}")]
    StartupTimedOut {
        /// The startup deadline that expired.
        timeout: Duration,
    },

    /// Failed to wait for the process.
    #[error("Failed to wait for client process: {0}")]
    WaitFailed(#[source] std::io::Error),

    /// Failed to send a signal.
    #[error("Failed to send signal to client: {0}")]
    SignalFailed(#[source] nix::Error),

    /// Failed to force-kill the process.
    #[error("Failed to kill client process: {0}")]
    KillFailed(#[source] std::io::Error),
}

impl SupervisorError {
    /// Collected client output, for errors that carry it.
    pub fn output(&self) -> Option<&str> {
        match self {
            SupervisorError::StartupFailed { output, .. } => Some(output),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_failed_display_and_output() {
        let err = SupervisorError::StartupFailed {
            reason: "failure marker observed".to_string(),
            output: "Failed to start: bad config\n".to_string(),
        };
        assert_eq!(err.to_string(), "Client failed to start: failure marker observed");
        assert_eq!(err.output(), Some("Failed to start: bad config\n"));
    }

    #[test]
    fn test_timed_out_display() {
        let err = SupervisorError::StartupTimedOut {
            timeout: Duration::from_secs(10),
        };
        assert!(err.to_string().contains("10s"));
        assert!(err.output().is_none());
    }
}
