//! Process launch capability.

use std::path::Path;
use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::debug;

/// Starts the client process.
///
/// Implementations must pipe stdout and should set `kill_on_drop` so a
/// dropped handle never leaks the process.
pub trait ProcessLauncher: Send + Sync {
    /// Launch `binary` against the client configuration at `config_path`.
    fn launch(&self, binary: &Path, config_path: &Path) -> std::io::Result<Child>;
}

/// Launches `<binary> -c <config>`, the Xray command line.
#[derive(Debug, Default, Clone, Copy)]
pub struct XrayLauncher;

impl ProcessLauncher for XrayLauncher {
    fn launch(&self, binary: &Path, config_path: &Path) -> std::io::Result<Child> {
        debug!("Launching {:?} -c {:?}", binary, config_path);
        Command::new(binary)
            .arg("-c")
            .arg(config_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_fails_to_launch() {
        let err = XrayLauncher
            .launch(
                Path::new("/nonexistent/proxy-verify-client"),
                Path::new("/tmp/client.json"),
            )
            .unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}
