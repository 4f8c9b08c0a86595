//! stackflow CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: Any failure

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::Cli;

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const FAILURE: u8 = 1;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let mut filter = EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into());
    if let Ok(directive) = format!("stackflow={}", level).parse() {
        filter = filter.add_directive(directive);
    }

    // Logging already initialized is not an error
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    match commands::run::execute(cli).await {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(ExitCodes::FAILURE)
        }
    }
}
