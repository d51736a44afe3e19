//! Verification report.
//!
//! Produced by a successful run; printed as a short summary and optionally
//! written as JSON with `--report`.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::probe::EgressInfo;

/// Everything worth keeping about a successful verification run.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration of the run in milliseconds.
    pub duration_ms: u64,
    /// Server configuration that was verified.
    pub server_config: PathBuf,
    /// Derived client configuration.
    pub client_config: PathBuf,
    /// Client binary that was launched.
    pub client_binary: PathBuf,
    /// Probe target.
    pub probe_url: String,
    /// Whether the probe used the client's local proxy.
    pub via_proxy: bool,
    /// Recognised egress identity, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub egress: Option<EgressInfo>,
    /// Raw probe response body, lossily decoded.
    pub body: String,
}

impl VerificationReport {
    /// Short human-readable summary.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Verification passed in {} ms", self.duration_ms);
        let _ = writeln!(out, "  server config: {}", self.server_config.display());
        let _ = writeln!(out, "  client config: {}", self.client_config.display());
        let _ = writeln!(
            out,
            "  probe:         {} ({})",
            self.probe_url,
            if self.via_proxy { "via client proxy" } else { "direct" }
        );
        match &self.egress {
            Some(egress) => {
                let _ = writeln!(out, "  egress:        {}", egress.summary());
            }
            None => {
                let _ = writeln!(out, "  response:      {} bytes", self.body.len());
            }
        }
        out
    }

    /// Write the report as pretty JSON.
    pub fn write_json(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json + "\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(egress: Option<EgressInfo>) -> VerificationReport {
        VerificationReport {
            started_at: Utc::now(),
            duration_ms: 1234,
            server_config: PathBuf::from("/usr/local/etc/xray/config.json"),
            client_config: PathBuf::from("/tmp/proxy-verify/client.json"),
            client_binary: PathBuf::from("/usr/local/bin/xray"),
            probe_url: "https://ipinfo.io/json".to_string(),
            via_proxy: false,
            egress,
            body: "{\"ip\":\"203.0.113.9\"}".to_string(),
        }
    }

    #[test]
    fn test_summary_with_egress() {
        let summary = report(EgressInfo::from_body(b"{\"ip\":\"203.0.113.9\"}")).summary();
        assert!(summary.starts_with("Verification passed in 1234 ms"));
        assert!(summary.contains("egress:        203.0.113.9"));
        assert!(summary.contains("(direct)"));
    }

    #[test]
    fn test_summary_without_egress() {
        let summary = report(None).summary();
        assert!(summary.contains("response:      20 bytes"));
    }

    #[test]
    fn test_write_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        report(None).write_json(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["duration_ms"], 1234);
        assert_eq!(value["via_proxy"], false);
        assert!(value.get("egress").is_none());
        assert!(value["started_at"].is_string());
    }
}
