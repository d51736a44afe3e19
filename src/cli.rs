//! Command-line interface definitions for proxy-verify.
//!
//! Uses clap's derive API for type-safe argument parsing.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Verify an Xray proxy server configuration end to end.
///
/// proxy-verify validates the server configuration, derives a minimal
/// shadowsocks client for it, starts that client, and probes an external
/// egress-identity service to confirm traffic flows.
#[derive(Parser, Debug)]
#[command(name = "proxy-verify")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to run (defaults to `verify`).
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to additional settings file.
    ///
    /// This file is merged on top of system and user settings, giving it the
    /// highest priority (except for CLI flags).
    #[arg(short = 'c', long = "config", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity.
    ///
    /// Can be specified multiple times:
    /// -v    = info level
    /// -vv   = debug level
    /// -vvv  = trace level (includes client stdout)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Per-run overrides of settings values.
    #[command(flatten)]
    pub overrides: Overrides,
}

/// Flags that override settings layers.
#[derive(Args, Debug, Default, Clone)]
pub struct Overrides {
    /// Server configuration JSON to verify.
    #[arg(long = "server-config", value_name = "PATH", global = true)]
    pub server_config: Option<PathBuf>,

    /// Client binary name or path.
    #[arg(long = "binary", value_name = "BINARY", global = true)]
    pub binary: Option<String>,

    /// Where to write the derived client configuration.
    #[arg(long = "client-config", value_name = "PATH", global = true)]
    pub client_config: Option<PathBuf>,

    /// Local HTTP proxy port of the client.
    #[arg(long = "local-port", value_name = "PORT", global = true)]
    pub local_port: Option<u16>,

    /// Egress-identity URL to probe.
    #[arg(long = "probe-url", value_name = "URL", global = true)]
    pub probe_url: Option<String>,

    /// Seconds to wait for the client to signal readiness.
    #[arg(long = "startup-timeout", value_name = "SECS", global = true)]
    pub startup_timeout: Option<u64>,

    /// Seconds before the probe request gives up.
    #[arg(long = "probe-timeout", value_name = "SECS", global = true)]
    pub probe_timeout: Option<u64>,

    /// Send the probe through the client's local HTTP proxy.
    #[arg(long = "via-proxy", global = true)]
    pub via_proxy: bool,

    /// Write a JSON verification report to this path.
    #[arg(long = "report", value_name = "PATH", global = true)]
    pub report: Option<PathBuf>,
}

/// Subcommands for proxy-verify.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Parse and validate the server configuration only.
    Check,

    /// Print the derived client configuration to stdout.
    Derive,

    /// Run the full verification pipeline.
    Verify,
}

impl Cli {
    /// The subcommand to run, `verify` when none was given.
    pub fn command(&self) -> Commands {
        self.command.unwrap_or(Commands::Verify)
    }
}
