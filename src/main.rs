mod cli;
mod commands;
mod engine;
mod model;
mod util;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::engine::AlignmentError;

const EXIT_FAILURE: u8 = 1;
const EXIT_ALIGNMENT_MISMATCH: u8 = 2;

fn main() -> ExitCode {
    init_tracing();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "command failed");
            for cause in err.chain().skip(1) {
                error!(cause = %cause, "caused by");
            }

            if err.downcast_ref::<AlignmentError>().is_some() {
                ExitCode::from(EXIT_ALIGNMENT_MISMATCH)
            } else {
                ExitCode::from(EXIT_FAILURE)
            }
        }
    }
}

fn run() -> Result<()> {
    match Cli::parse().command {
        Commands::Extract(args) => commands::extract::run(args),
        Commands::Batch(args) => commands::batch::run(args),
    }
}

/// Records go to stdout, so logs always go to stderr.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
