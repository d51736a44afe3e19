//! Settings loading with hierarchy merging.
//!
//! Settings are loaded from multiple sources and merged in order:
//!
//! 1. Embedded defaults (compiled into binary)
//! 2. System config: `/etc/proxy-verify/config.toml`
//! 3. User config: `~/.config/proxy-verify/config.toml`
//! 4. Additional config file (via `--config` flag)
//! 5. CLI flags (highest priority)

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::ConfigError;
use super::schema::{
    ClientSettings, ProbeSettings, ServerSettings, Settings, TimeoutSettings,
};
use crate::cli::{Cli, Overrides};

/// System-wide configuration path.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/proxy-verify/config.toml";

/// User configuration directory name.
pub const USER_CONFIG_DIR: &str = "proxy-verify";

/// User configuration filename.
pub const USER_CONFIG_FILE: &str = "config.toml";

/// Settings loader with support for hierarchy merging.
pub struct ConfigLoader {
    /// Path to system-wide configuration.
    system_path: PathBuf,
    /// Path to user configuration.
    user_path: PathBuf,
}

impl ConfigLoader {
    /// Create a new ConfigLoader with default paths.
    #[must_use]
    pub fn new() -> Self {
        let user_config_dir = dirs::config_dir()
            .map(|p| p.join(USER_CONFIG_DIR))
            .unwrap_or_else(|| PathBuf::from(".config").join(USER_CONFIG_DIR));

        Self {
            system_path: PathBuf::from(SYSTEM_CONFIG_PATH),
            user_path: user_config_dir.join(USER_CONFIG_FILE),
        }
    }

    /// Create a ConfigLoader with custom paths (for testing).
    #[must_use]
    pub fn with_paths(system_path: PathBuf, user_path: PathBuf) -> Self {
        Self {
            system_path,
            user_path,
        }
    }

    /// Load, merge and validate settings from all sources.
    ///
    /// Missing system and user files are skipped. A missing `--config` file
    /// and invalid TOML anywhere are errors.
    pub fn load(&self, cli: &Cli) -> Result<Settings, ConfigError> {
        let mut settings = Settings::embedded()?;
        debug!("Loaded embedded default settings");

        for path in [&self.system_path, &self.user_path] {
            if let Some(layer) = self.load_file(path)? {
                settings.merge(layer);
                debug!("Loaded settings from {:?}", path);
            } else {
                debug!("No settings file at {:?}", path);
            }
        }

        if let Some(ref cli_config_path) = cli.config {
            match self.load_file(cli_config_path)? {
                Some(layer) => {
                    settings.merge(layer);
                    debug!("Loaded additional settings from {:?}", cli_config_path);
                }
                None => {
                    // Unlike system/user config, a missing CLI-specified config is an error
                    return Err(ConfigError::ReadError {
                        path: cli_config_path.clone(),
                        source: std::io::Error::new(
                            std::io::ErrorKind::NotFound,
                            "Specified config file not found",
                        ),
                    });
                }
            }
        }

        settings.merge(cli_layer(&cli.overrides));
        settings.validate()?;
        Ok(settings)
    }

    /// Load a settings file, returning None if it doesn't exist.
    fn load_file(&self, path: &Path) -> Result<Option<Settings>, ConfigError> {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let settings: Settings =
                    toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
                        path: path.to_path_buf(),
                        source: e,
                    })?;
                Ok(Some(settings))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ConfigError::ReadError {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Express CLI overrides as a settings layer.
fn cli_layer(overrides: &Overrides) -> Settings {
    Settings {
        server: ServerSettings {
            config_path: overrides.server_config.clone(),
            ..Default::default()
        },
        client: ClientSettings {
            binary: overrides.binary.clone().unwrap_or_default(),
            config_path: overrides.client_config.clone(),
            local_port: overrides.local_port.unwrap_or(0),
            ..Default::default()
        },
        probe: ProbeSettings {
            url: overrides.probe_url.clone().unwrap_or_default(),
            timeout_secs: overrides.probe_timeout.unwrap_or(0),
            via_proxy: overrides.via_proxy.then_some(true),
        },
        timeouts: TimeoutSettings {
            startup_secs: overrides.startup_timeout.unwrap_or(0),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Read and parse the server configuration document.
pub fn load_server_config(path: &Path) -> Result<crate::xray::ServerConfig, ConfigError> {
    let text = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;
    crate::xray::ServerConfig::from_json(&text).map_err(|e| ConfigError::ServerParseError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Locate the client binary: paths are checked directly, bare names are
/// looked up in `PATH`.
pub fn resolve_client_binary(binary: &str) -> Result<PathBuf, ConfigError> {
    let path = PathBuf::from(binary);
    if binary.contains('/') {
        if path.is_file() {
            Ok(path)
        } else {
            Err(ConfigError::BinaryNotFound {
                binary: binary.to_string(),
                message: "no such file".to_string(),
            })
        }
    } else {
        which::which(binary).map_err(|e| ConfigError::BinaryNotFound {
            binary: binary.to_string(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::tempdir;

    fn create_test_cli(args: &[&str]) -> Cli {
        let mut argv = vec!["proxy-verify"];
        argv.extend_from_slice(args);
        Cli::parse_from(argv)
    }

    fn loader_in(dir: &Path) -> ConfigLoader {
        ConfigLoader::with_paths(dir.join("system.toml"), dir.join("user.toml"))
    }

    #[test]
    fn test_missing_files_use_defaults() {
        let dir = tempdir().unwrap();
        let settings = loader_in(dir.path()).load(&create_test_cli(&[])).unwrap();

        assert_eq!(settings.client.local_port, 10808);
        assert_eq!(settings.server.protocol, "shadowsocks");
    }

    #[test]
    fn test_user_config_overrides_system() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("system.toml"), "[timeouts]\nstartup_secs = 30\n").unwrap();
        fs::write(dir.path().join("user.toml"), "[timeouts]\nstartup_secs = 45\n").unwrap();

        let settings = loader_in(dir.path()).load(&create_test_cli(&[])).unwrap();

        assert_eq!(settings.timeouts.startup_secs, 45);
        assert_eq!(settings.timeouts.shutdown_grace_secs, 5);
    }

    #[test]
    fn test_cli_flags_win() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("user.toml"),
            "[client]\nlocal_port = 20000\n[server]\nconfig_path = \"/etc/xray/a.json\"\n",
        )
        .unwrap();

        let cli = create_test_cli(&[
            "--local-port",
            "30000",
            "--server-config",
            "/srv/b.json",
            "--via-proxy",
        ]);
        let settings = loader_in(dir.path()).load(&cli).unwrap();

        assert_eq!(settings.client.local_port, 30000);
        assert_eq!(settings.server_config_path().unwrap(), &PathBuf::from("/srv/b.json"));
        assert!(settings.via_proxy());
    }

    #[test]
    fn test_missing_cli_config_is_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let cli = create_test_cli(&["--config", missing.to_str().unwrap()]);

        let err = loader_in(dir.path()).load(&cli).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("system.toml"), "this is not valid TOML [[[").unwrap();

        let err = loader_in(dir.path()).load(&create_test_cli(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_invalid_merged_value_is_rejected() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("user.toml"), "[markers]\nfailed = \"started\"\n").unwrap();

        let err = loader_in(dir.path()).load(&create_test_cli(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_unsupported_server_protocol_is_rejected() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("user.toml"), "[server]\nprotocol = \"vless\"\n").unwrap();

        let err = loader_in(dir.path()).load(&create_test_cli(&[])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref field, .. } if field == "server.protocol"
        ));
    }

    #[test]
    fn test_load_server_config_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("server.json");

        assert!(matches!(
            load_server_config(&path),
            Err(ConfigError::ReadError { .. })
        ));

        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            load_server_config(&path),
            Err(ConfigError::ServerParseError { .. })
        ));
    }

    #[test]
    fn test_resolve_client_binary() {
        assert!(resolve_client_binary("sh").is_ok());
        assert!(matches!(
            resolve_client_binary("/nonexistent/xray"),
            Err(ConfigError::BinaryNotFound { .. })
        ));
        assert!(resolve_client_binary("definitely-not-a-real-binary-name").is_err());
    }
}
