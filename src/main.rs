//! Concierge CLI entry point.

use anyhow::Result;
use clap::Parser;

use concierge::cli::{Cli, Commands};
use concierge::domain::models::Config;
use concierge::infrastructure::config::ConfigLoader;
use concierge::infrastructure::logging::{LogConfig, LoggerImpl};

fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => concierge::cli::handle_error(err, cli.json),
    };

    // Held for the whole run so buffered file logs are flushed on exit
    let _logger = match LoggerImpl::init(&LogConfig::from(&config.logging)) {
        Ok(logger) => logger,
        Err(err) => concierge::cli::handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Chat(args) => concierge::cli::commands::chat::execute(args, &config, cli.json).await,
        Commands::Plan(args) => concierge::cli::commands::plan::execute(args, &config, cli.json).await,
        Commands::Extract(args) => concierge::cli::commands::extract::execute(args, cli.json).await,
        Commands::Config(args) => concierge::cli::commands::config::execute(args, &config, cli.json).await,
    };

    if let Err(err) = result {
        concierge::cli::handle_error(err, cli.json);
    }
}
