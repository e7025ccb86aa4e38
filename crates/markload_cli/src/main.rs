mod cli;
mod commands;
mod config;

use anyhow::Result;
use clap::Parser;

use crate::cli::Cli;
use crate::config::CliConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = CliConfig::load(&cli.config)?;
    markload_logging::initialize(config.log_destination(), config.log_level()?);

    commands::execute(cli.command, &config).await
}
