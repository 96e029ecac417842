use std::process::ExitCode;

use anyhow::anyhow;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod bootstrap;
mod cli;
mod commands;
mod context;
mod output;
mod terminal;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    let flags = cli.global_flags();
    match run(cli.command, &flags).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("tide error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: cli::Commands, flags: &cli::GlobalFlags) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_env("TIDE_LOG")
        .unwrap_or_else(|_| EnvFilter::new(flags.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(flags.verbose)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow!("tracing subscriber already set: {error}"))?;

    let config = bootstrap::load_config(flags)?;
    let ctx = context::AppContext::init(config).await?;
    commands::dispatch::dispatch(command, &ctx, flags).await
}
