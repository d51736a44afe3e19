//! Settings schema definitions.
//!
//! Settings are loaded from multiple sources and merged in order:
//!
//! 1. Embedded defaults (`config/default.toml`)
//! 2. System config: `/etc/proxy-verify/config.toml`
//! 3. User config: `~/.config/proxy-verify/config.toml`
//! 4. Additional config file (via `--config` flag)
//! 5. CLI flags (highest priority)
//!
//! Scalars are overridden when the later layer sets them (non-empty strings,
//! non-zero numbers, present options).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::error::ConfigError;
use crate::xray::PROTOCOL_SHADOWSOCKS;

/// Top-level settings structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    /// Server under verification.
    #[serde(default)]
    pub server: ServerSettings,

    /// Verification client.
    #[serde(default)]
    pub client: ClientSettings,

    /// Connectivity probe.
    #[serde(default)]
    pub probe: ProbeSettings,

    /// Startup and shutdown deadlines.
    #[serde(default)]
    pub timeouts: TimeoutSettings,

    /// Client stdout markers.
    #[serde(default)]
    pub markers: MarkerSettings,
}

impl Settings {
    /// Parse the embedded defaults.
    pub fn embedded() -> Result<Self, ConfigError> {
        toml::from_str(DEFAULT_TOML).map_err(|e| ConfigError::ParseError {
            path: PathBuf::from("<embedded:default.toml>"),
            source: e,
        })
    }

    /// Merge another settings layer into this one.
    pub fn merge(&mut self, other: Settings) {
        self.server.merge(other.server);
        self.client.merge(other.client);
        self.probe.merge(other.probe);
        self.timeouts.merge(other.timeouts);
        self.markers.merge(other.markers);
    }

    /// Check values that would make a run meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &str, message: &str| {
            Err(ConfigError::InvalidValue {
                field: field.to_string(),
                message: message.to_string(),
            })
        };

        if self.server.protocol != PROTOCOL_SHADOWSOCKS {
            return invalid(
                "server.protocol",
                &format!(
                    "only \"{}\" is supported by the verification client, got \"{}\"",
                    PROTOCOL_SHADOWSOCKS, self.server.protocol
                ),
            );
        }
        if self.client.binary.is_empty() {
            return invalid("client.binary", "must not be empty");
        }
        if self.client.local_port == 0 {
            return invalid("client.local_port", "must be in 1-65535");
        }
        if self.probe.url.is_empty() {
            return invalid("probe.url", "must not be empty");
        }
        if self.probe.timeout_secs == 0 {
            return invalid("probe.timeout_secs", "must be greater than zero");
        }
        if self.timeouts.startup_secs == 0 {
            return invalid("timeouts.startup_secs", "must be greater than zero");
        }
        if self.timeouts.shutdown_grace_secs == 0 {
            return invalid("timeouts.shutdown_grace_secs", "must be greater than zero");
        }
        if self.markers.started.is_empty() || self.markers.failed.is_empty() {
            return invalid("markers", "started and failed markers must not be empty");
        }
        if self.markers.started.contains(&self.markers.failed)
            || self.markers.failed.contains(&self.markers.started)
        {
            return invalid("markers", "started and failed markers must not overlap");
        }
        Ok(())
    }

    /// Path of the server configuration, if any layer set it.
    pub fn server_config_path(&self) -> Result<&PathBuf, ConfigError> {
        self.server
            .config_path
            .as_ref()
            .ok_or_else(|| ConfigError::MissingValue {
                field: "server.config_path".to_string(),
                hint: "pass --server-config or set [server] config_path".to_string(),
            })
    }

    /// Where the derived client configuration is written.
    pub fn client_config_path(&self) -> PathBuf {
        self.client
            .config_path
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("proxy-verify").join("client.json"))
    }

    /// Whether the probe goes through the client's local proxy.
    pub fn via_proxy(&self) -> bool {
        self.probe.via_proxy.unwrap_or(false)
    }

    /// Probe timeout.
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe.timeout_secs)
    }

    /// Startup deadline.
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.startup_secs)
    }

    /// Grace period between SIGTERM and SIGKILL.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.timeouts.shutdown_grace_secs)
    }
}

/// Shipped default settings.
pub const DEFAULT_TOML: &str = include_str!("../../config/default.toml");

/// `[server]` section.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ServerSettings {
    /// Server configuration JSON to verify.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_path: Option<PathBuf>,

    /// Inbound protocol the verification client speaks.
    #[serde(default)]
    pub protocol: String,

    /// Address the client dials.
    #[serde(default)]
    pub address: String,
}

impl ServerSettings {
    fn merge(&mut self, other: ServerSettings) {
        if other.config_path.is_some() {
            self.config_path = other.config_path;
        }
        if !other.protocol.is_empty() {
            self.protocol = other.protocol;
        }
        if !other.address.is_empty() {
            self.address = other.address;
        }
    }
}

/// `[client]` section.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ClientSettings {
    /// Binary name (looked up in `PATH`) or path.
    #[serde(default)]
    pub binary: String,

    /// Where to write the derived client configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_path: Option<PathBuf>,

    /// Port of the client's local HTTP inbound.
    #[serde(default)]
    pub local_port: u16,

    /// Client log level.
    #[serde(default)]
    pub log_level: String,
}

impl ClientSettings {
    fn merge(&mut self, other: ClientSettings) {
        if !other.binary.is_empty() {
            self.binary = other.binary;
        }
        if other.config_path.is_some() {
            self.config_path = other.config_path;
        }
        if other.local_port != 0 {
            self.local_port = other.local_port;
        }
        if !other.log_level.is_empty() {
            self.log_level = other.log_level;
        }
    }
}

/// `[probe]` section.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ProbeSettings {
    /// Egress-identity URL.
    #[serde(default)]
    pub url: String,

    /// Request timeout in seconds.
    #[serde(default)]
    pub timeout_secs: u64,

    /// Route the probe through the client's local proxy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub via_proxy: Option<bool>,
}

impl ProbeSettings {
    fn merge(&mut self, other: ProbeSettings) {
        if !other.url.is_empty() {
            self.url = other.url;
        }
        if other.timeout_secs != 0 {
            self.timeout_secs = other.timeout_secs;
        }
        if other.via_proxy.is_some() {
            self.via_proxy = other.via_proxy;
        }
    }
}

/// `[timeouts]` section.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct TimeoutSettings {
    /// Seconds to wait for a readiness marker.
    #[serde(default)]
    pub startup_secs: u64,

    /// Seconds between SIGTERM and SIGKILL.
    #[serde(default)]
    pub shutdown_grace_secs: u64,
}

impl TimeoutSettings {
    fn merge(&mut self, other: TimeoutSettings) {
        if other.startup_secs != 0 {
            self.startup_secs = other.startup_secs;
        }
        if other.shutdown_grace_secs != 0 {
            self.shutdown_grace_secs = other.shutdown_grace_secs;
        }
    }
}

/// `[markers]` section.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct MarkerSettings {
    /// Substring of the client's "up" line.
    #[serde(default)]
    pub started: String,

    /// Substring of the client's startup failure line.
    #[serde(default)]
    pub failed: String,
}

impl MarkerSettings {
    fn merge(&mut self, other: MarkerSettings) {
        if !other.started.is_empty() {
            self.started = other.started;
        }
        if !other.failed.is_empty() {
            self.failed = other.failed;
        }
    }
}
