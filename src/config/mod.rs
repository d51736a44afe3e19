//! Settings for proxy-verify itself.
//!
//! This module provides TOML settings loading with hierarchy merging, plus
//! loading of the JSON server configuration under verification.
//!
//! # Configuration Hierarchy
//!
//! 1. Embedded defaults (`config/default.toml`)
//! 2. System config: `/etc/proxy-verify/config.toml`
//! 3. User config: `~/.config/proxy-verify/config.toml`
//! 4. Additional config file (via `--config` flag)
//! 5. CLI flags (highest priority)
//!
//! # Example
//!
//! ```toml
//! [server]
//! config_path = "/usr/local/etc/xray/config.json"
//!
//! [client]
//! binary = "/usr/local/bin/xray"
//!
//! [probe]
//! via_proxy = true
//! ```

mod error;
mod loader;
mod schema;

pub use error::ConfigError;
pub use loader::{load_server_config, resolve_client_binary, ConfigLoader};
pub use schema::{
    ClientSettings, MarkerSettings, ProbeSettings, ServerSettings, Settings, TimeoutSettings,
};
