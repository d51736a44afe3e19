//! proxy-verify: end-to-end verification of an Xray server configuration
//!
//! This is the main entry point for the proxy-verify binary. It handles CLI
//! argument parsing, settings loading and telemetry initialization, then
//! dispatches to the selected subcommand.
//!
//! # I/O Architecture
//!
//! - **Audit logging**: Goes to syslog (not stdout/stderr)
//! - **Debug logging**: `tracing` output on stderr, controlled by `-v` / `RUST_LOG`
//! - **Results**: The summary (or derived config) on stdout, failures on stderr

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use proxy_verify::{cli::Cli, cli_handler, config::ConfigLoader, telemetry};
use tracing::{debug, warn};

fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before any other initialization)
    let cli = Cli::parse();

    init_tracing(cli.verbose)?;

    debug!("Parsed CLI arguments: {:?}", cli);

    // Audit events are best-effort: hosts without syslog still verify
    if let Err(e) = telemetry::init_logger() {
        warn!("Audit logging disabled: {}", e);
        telemetry::init_null_logger().context("Failed to initialize telemetry")?;
    }

    let settings = ConfigLoader::new()
        .load(&cli)
        .context("Failed to load configuration")?;

    debug!("Loaded settings: {:?}", settings);

    cli_handler::handle_command(&cli, settings)
}

/// Initialize the tracing subscriber for debug/development logging.
///
/// This is separate from the audit telemetry which goes to syslog.
///
/// # Verbosity Levels
/// - 0 (default): `RUST_LOG`, or warnings and errors
/// - 1 (-v): Info level
/// - 2 (-vv): Debug level
/// - 3+ (-vvv): Trace level (client stdout lines)
fn init_tracing(verbose: u8) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    Ok(())
}
