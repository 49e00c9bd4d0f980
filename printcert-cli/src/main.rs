// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  printcert: printer TLS certificate installer
//
//  Drives the printer's HTML admin console: upload a new key and
//  certificate, make it the served one, delete the one it replaced.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

mod cli;
mod orchestrator;

use clap::Parser;
use cli::{Cli, Command};
use printcert_core::config::LogConfig;
use printcert_core::{AppConfig, ConsoleError, Result};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // ── Config ──
    let config = AppConfig::from_figment(cli.apply(AppConfig::figment(cli.config.as_deref())))?;

    // ── Tracing ──
    init_tracing(&config.log);
    info!(version = env!("CARGO_PKG_VERSION"), "printcert starting");

    let result = match cli.command() {
        Command::Install => orchestrator::install(&config).map(|outcome| {
            info!(outcome = %outcome, "Install finished");
            println!("{outcome}");
        }),
        Command::List => orchestrator::list(&config).map(|lines| {
            for line in lines {
                println!("{line}");
            }
        }),
        Command::Active => orchestrator::active(&config).map(|line| println!("{line}")),
        Command::Delete { id } => orchestrator::delete_one(&config, &id).map(|()| {
            info!(id = %id, "Certificate deleted");
        }),
    };

    Ok(exit_code(result))
}

/// Failures are reported through tracing once, then mapped to the exit status.
fn exit_code(result: Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}

fn report(e: &ConsoleError) {
    error!(kind = e.kind(), error = %e, "printcert failed");
    if matches!(e, ConsoleError::AmbiguousResult { .. }) {
        error!("Check the certificate list on the device; `printcert list` shows it");
    }
}
