use clap::Parser;
use colored::*;
use datetidy::cli::{Cli, run_cli};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();

    match run_cli(&cli) {
        Ok(totals) if totals.failed > 0 => ExitCode::from(1),
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            if !e.is_reported() || cli.quiet {
                eprintln!("{} {}", "✗".red(), e);
            }
            ExitCode::from(e.exit_code())
        }
    }
}

/// Diagnostics go to stderr, filtered by `DATETIDY_LOG` (default `warn`).
fn init_tracing() {
    let filter = EnvFilter::try_from_env("DATETIDY_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
