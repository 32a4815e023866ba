//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::commands::classify::ClassifyArgs;
use super::commands::context::ContextArgs;
use super::commands::fix::FixArgs;
use super::commands::init::InitArgs;
use super::commands::rules::RulesArgs;
use super::commands::run::RunArgs;

/// Top-level command line.
#[derive(Parser, Debug)]
#[command(name = "autofix")]
#[command(about = "Classify build and runtime errors and fix them in cost tiers", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to .autofix/config.yaml)
    #[arg(short, long, global = true, env = "AUTOFIX_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a starter .autofix/config.yaml
    Init(InitArgs),

    /// Classify an error message without fixing it
    Classify(ClassifyArgs),

    /// Run a command and fix its errors until it succeeds
    Run(RunArgs),

    /// Try to fix a single error
    Fix(FixArgs),

    /// Show what the context engine sees in a project
    Context(ContextArgs),

    /// List the classifier rules
    Rules(RulesArgs),
}
