//! autofix CLI entry point.

use anyhow::Context;
use clap::Parser;
use std::process::ExitCode;

use autofix::cli::commands::{classify, context, fix, init, rules, run};
use autofix::cli::{handle_error, Cli, Commands};
use autofix::infrastructure::config::ConfigLoader;
use autofix::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
    .context("Failed to load configuration");
    let config = match config {
        Ok(config) => config,
        Err(err) => handle_error(err, cli.json),
    };

    let _logger = match LoggerImpl::init(&LogConfig::from_settings(&config.logging)) {
        Ok(logger) => logger,
        Err(err) => handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Init(args) => init::execute(args, cli.json).await.map(|()| true),
        Commands::Classify(args) => classify::execute(args, &config, cli.json).await.map(|()| true),
        Commands::Run(args) => run::execute(args, config, cli.json).await,
        Commands::Fix(args) => fix::execute(args, config, cli.json).await.map(|()| true),
        Commands::Context(args) => context::execute(args, &config, cli.json).await.map(|()| true),
        Commands::Rules(args) => rules::execute(args, &config, cli.json).await.map(|()| true),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(err) => handle_error(err, cli.json),
    }
}
