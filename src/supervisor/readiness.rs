//! Startup readiness detection from client stdout.
//!
//! A background scanner reads the client's stdout line by line and fires a
//! one-shot [`StartupSignal`] when it sees the first marker, or when the
//! stream closes without one. The lines collected up to that point travel
//! inside the signal, so the scanner is their only writer. After firing, the
//! scanner keeps draining the stream so the client never blocks on a full
//! pipe.

use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

/// Upper bound on collected output, in bytes. Older lines are dropped first.
pub const OUTPUT_CAP: usize = 64 * 1024;

/// Reason attached to a failure-marker outcome.
pub const REASON_FAILURE_MARKER: &str = "failure marker observed";

/// Reason attached to an outcome where stdout closed before any marker.
pub const REASON_EXITED_EARLY: &str = "exited before signalling readiness";

/// The two literal substrings that decide startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupMarkers {
    /// Present in a line when the client is up.
    pub started: String,
    /// Present in a line when the client gave up.
    pub failed: String,
}

/// Which marker a line carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// Success marker.
    Started,
    /// Failure marker.
    Failed,
}

impl StartupMarkers {
    /// Create a marker pair.
    pub fn new(started: impl Into<String>, failed: impl Into<String>) -> Self {
        Self {
            started: started.into(),
            failed: failed.into(),
        }
    }

    /// Classify one line. The failure marker wins if both are present.
    pub fn classify(&self, line: &str) -> Option<Marker> {
        if line.contains(&self.failed) {
            Some(Marker::Failed)
        } else if line.contains(&self.started) {
            Some(Marker::Started)
        } else {
            None
        }
    }
}

/// Message sent once by the scanner.
#[derive(Debug)]
pub enum StartupSignal {
    /// Success marker seen.
    Started {
        /// Output up to and including the marker line.
        output: String,
    },
    /// Failure marker seen.
    Failed {
        /// Output up to and including the marker line.
        output: String,
    },
    /// Stream closed with no marker.
    Closed {
        /// Everything the client printed.
        output: String,
    },
}

/// Readiness of a starting client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// No marker yet.
    Pending,
    /// Success marker observed.
    Ready,
    /// Failure marker observed or the client exited early.
    Failed,
    /// The deadline passed first.
    TimedOut,
}

/// Final result of waiting for readiness.
#[derive(Debug)]
pub enum StartupOutcome {
    /// The client is up.
    Ready {
        /// Output collected during startup.
        output: String,
    },
    /// The client will not come up.
    Failed {
        /// Why startup failed.
        reason: String,
        /// Output collected during startup.
        output: String,
    },
    /// Neither marker arrived in time.
    TimedOut,
}

impl StartupOutcome {
    /// The readiness state this outcome settles on.
    pub fn readiness(&self) -> Readiness {
        match self {
            StartupOutcome::Ready { .. } => Readiness::Ready,
            StartupOutcome::Failed { .. } => Readiness::Failed,
            StartupOutcome::TimedOut => Readiness::TimedOut,
        }
    }
}

impl From<StartupSignal> for StartupOutcome {
    fn from(signal: StartupSignal) -> Self {
        match signal {
            StartupSignal::Started { output } => StartupOutcome::Ready { output },
            StartupSignal::Failed { output } => StartupOutcome::Failed {
                reason: REASON_FAILURE_MARKER.to_string(),
                output,
            },
            StartupSignal::Closed { output } => StartupOutcome::Failed {
                reason: REASON_EXITED_EARLY.to_string(),
                output,
            },
        }
    }
}

/// Receiving side of the readiness signal.
pub struct ReadinessWatch {
    rx: oneshot::Receiver<StartupSignal>,
    resolved: Option<StartupSignal>,
}

impl ReadinessWatch {
    /// Wrap the receiver paired with a scanner's sender.
    pub fn new(rx: oneshot::Receiver<StartupSignal>) -> Self {
        Self { rx, resolved: None }
    }

    /// Current state without waiting.
    pub fn poll(&mut self) -> Readiness {
        if self.resolved.is_none() {
            match self.rx.try_recv() {
                Ok(signal) => self.resolved = Some(signal),
                Err(oneshot::error::TryRecvError::Empty) => return Readiness::Pending,
                Err(oneshot::error::TryRecvError::Closed) => return Readiness::Failed,
            }
        }
        match self.resolved {
            Some(StartupSignal::Started { .. }) => Readiness::Ready,
            _ => Readiness::Failed,
        }
    }

    /// Wait for the signal for at most `timeout`.
    ///
    /// Expiry does not touch the process or the scanner.
    pub async fn wait(self, timeout: Duration) -> StartupOutcome {
        if let Some(signal) = self.resolved {
            return signal.into();
        }

        match tokio::time::timeout(timeout, self.rx).await {
            Ok(Ok(signal)) => signal.into(),
            Ok(Err(_)) => StartupOutcome::Failed {
                reason: "output scanner stopped before signalling".to_string(),
                output: String::new(),
            },
            Err(_) => {
                debug!("No readiness marker within {:?}", timeout);
                StartupOutcome::TimedOut
            }
        }
    }
}

/// Bounded line buffer that keeps the most recent output.
#[derive(Debug)]
struct OutputBuffer {
    text: String,
    cap: usize,
}

impl OutputBuffer {
    fn new(cap: usize) -> Self {
        Self {
            text: String::new(),
            cap,
        }
    }

    fn push_line(&mut self, line: &str) {
        self.text.push_str(line);
        self.text.push('\n');

        if self.text.len() > self.cap {
            let mut cut = self.text.len() - self.cap;
            while !self.text.is_char_boundary(cut) {
                cut += 1;
            }
            self.text.drain(..cut);
        }
    }

    fn take(&mut self) -> String {
        std::mem::take(&mut self.text)
    }
}

/// Scan `reader` for markers, firing `tx` exactly once.
///
/// Runs until the stream closes. Every line is logged at trace level under
/// the `proxy_verify::client_stdout` target.
pub async fn scan_output<R>(reader: R, markers: StartupMarkers, tx: oneshot::Sender<StartupSignal>)
where
    R: AsyncBufRead + Unpin,
{
    scan_output_capped(reader, markers, tx, OUTPUT_CAP).await
}

async fn scan_output_capped<R>(
    mut reader: R,
    markers: StartupMarkers,
    tx: oneshot::Sender<StartupSignal>,
    cap: usize,
) where
    R: AsyncBufRead + Unpin,
{
    let mut raw = Vec::new();
    let mut tx = Some(tx);
    let mut output = OutputBuffer::new(cap);

    loop {
        raw.clear();
        match reader.read_until(b'\n', &mut raw).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("Error reading client stdout: {}", e);
                break;
            }
        }
        let line = decode_line(&raw);

        trace!(target: "proxy_verify::client_stdout", "{}", line);

        if tx.is_none() {
            continue;
        }

        output.push_line(&line);
        let Some(marker) = markers.classify(&line) else {
            continue;
        };

        debug!("Readiness marker seen: {:?}", marker);
        let collected = output.take();
        let signal = match marker {
            Marker::Failed => StartupSignal::Failed { output: collected },
            Marker::Started => StartupSignal::Started { output: collected },
        };
        if let Some(sender) = tx.take() {
            // The receiver may already have timed out.
            let _ = sender.send(signal);
        }
    }

    if let Some(sender) = tx.take() {
        debug!("Client stdout closed before any readiness marker");
        let _ = sender.send(StartupSignal::Closed {
            output: output.take(),
        });
    }
}

/// Strip the line terminator and decode, replacing invalid UTF-8.
fn decode_line(raw: &[u8]) -> String {
    let line = raw.strip_suffix(b"\n").unwrap_or(raw);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}
