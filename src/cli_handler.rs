//! Subcommand dispatch for proxy-verify.
//!
//! `check` and `derive` are synchronous; `verify` runs the full pipeline on a
//! tokio runtime. Human-facing output goes to stdout, failures to stderr.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use crate::cli::{Cli, Commands};
use crate::config::Settings;
use crate::orchestrator::{RunError, Verifier};
use crate::supervisor::XrayLauncher;

/// Lines of client output echoed after a startup failure.
const OUTPUT_TAIL_LINES: usize = 20;

/// Run the selected subcommand and map its result to an exit code.
pub fn handle_command(cli: &Cli, settings: Settings) -> Result<ExitCode> {
    let verifier = Verifier::new(settings, Arc::new(XrayLauncher));

    let result = match cli.command() {
        Commands::Check => run_check(&verifier),
        Commands::Derive => run_derive(&verifier)?,
        Commands::Verify => run_verify(cli, &verifier)?,
    };

    Ok(match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_failure(&e);
            ExitCode::from(e.exit_code())
        }
    })
}

fn run_check(verifier: &Verifier) -> Result<(), RunError> {
    let server = verifier.check()?;
    println!(
        "Server config OK: {} inbound(s), {} outbound(s)",
        server.inbounds.len(),
        server.outbounds.len()
    );
    Ok(())
}

fn run_derive(verifier: &Verifier) -> Result<Result<(), RunError>> {
    let client = match verifier.derive() {
        Ok(client) => client,
        Err(e) => return Ok(Err(e)),
    };
    let json = client
        .to_json()
        .context("Failed to serialize client config")?;
    println!("{json}");
    Ok(Ok(()))
}

fn run_verify(cli: &Cli, verifier: &Verifier) -> Result<Result<(), RunError>> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    let report = match rt.block_on(verifier.run()) {
        Ok(report) => report,
        Err(e) => return Ok(Err(e)),
    };

    print!("{}", report.summary());

    if let Some(ref path) = cli.overrides.report {
        report
            .write_json(path)
            .with_context(|| format!("Failed to write report to {:?}", path))?;
        debug!("Wrote report to {:?}", path);
    }

    Ok(Ok(()))
}

fn report_failure(e: &RunError) {
    eprintln!("Error: {e}");

    if let Some(output) = e.client_output().filter(|o| !o.trim().is_empty()) {
        eprintln!("Client output (last {OUTPUT_TAIL_LINES} lines):");
        for line in tail_lines(output, OUTPUT_TAIL_LINES) {
            eprintln!("  {line}");
        }
    }

    if e.is_defect() {
        eprintln!("This is a bug in proxy-verify; please report it.");
    }
}

fn tail_lines(text: &str, n: usize) -> impl Iterator<Item = &str> {
    let lines: Vec<&str> = text.lines().collect();
    let skip = lines.len().saturating_sub(n);
    lines.into_iter().skip(skip)
}
