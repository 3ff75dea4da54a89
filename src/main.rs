mod app;
mod clean;
mod cli;
mod config;
mod extract;
mod llm;
mod pipeline;
mod search;
mod synth;

pub const USER_AGENT: &str = concat!("agentic-search/", env!("CARGO_PKG_VERSION"));

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};

/// Conventional status for termination by SIGINT.
const INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("agentic_search=info".parse()?),
        )
        .init();

    let cli = cli::Cli::parse();
    info!(input = %cli.input.display(), output = %cli.output.display(), "starting");

    tokio::select! {
        outcome = app::run(&cli, config::Config::from_env) => match outcome {
            Ok(summary) => {
                println!("{summary}");
                Ok(ExitCode::SUCCESS)
            }
            Err(e) => {
                error!("{e}");
                Ok(ExitCode::FAILURE)
            }
        },
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted, in-flight records dropped");
            Ok(ExitCode::from(INTERRUPTED))
        }
    }
}
