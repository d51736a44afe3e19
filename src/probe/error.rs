//! Error types for the connectivity probe.

use std::time::Duration;
use thiserror::Error;

/// Errors from a single probe request.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The HTTP client could not be configured.
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// No response within the probe timeout.
    #[error("Request to {url} timed out after {timeout:?}")]
    Timeout {
        /// Probe target.
        url: String,
        /// Configured timeout.
        timeout: Duration,
    },

    /// Connection or protocol failure.
    #[error("Request to {url} failed: {source}")]
    Request {
        /// Probe target.
        url: String,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// The target answered with a non-2xx status.
    #[error("{url} returned HTTP {status}")]
    Status {
        /// Probe target.
        url: String,
        /// Response status code.
        status: u16,
    },

    /// The body could not be read.
    #[error("Failed to read response body from {url}: {source}")]
    Body {
        /// Probe target.
        url: String,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
}
