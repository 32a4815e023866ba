//! Implementation of the `autofix init` command.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tokio::fs;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;
use crate::infrastructure::config::CONFIG_DIR;

const CONFIG_HEADER: &str = "# autofix configuration\n\
# Environment variables override these values, e.g. AUTOFIX_EXECUTOR__MAX_ATTEMPTS=5.\n\
# The Claude API key is read from ANTHROPIC_API_KEY when claude.api_key is unset.\n\n";

const RULES_TEMPLATE: &str = "# Project-specific classifier rules, tried before the built-in table.\n\
# Point classifier.rules_file at this file to enable it.\n\
#\n\
# fixable:\n\
#   - id: my-missing-env\n\
#     type: config\n\
#     confidence: 0.9\n\
#     action: \"Add ${symbol} to .env\"\n\
#     context:\n\
#       config: .env\n\
#     pattern: 'Missing environment variable (?P<symbol>[A-Z_]+)'\n\
fixable: []\n";

/// Arguments for `autofix init`.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing configuration
    #[arg(long, short)]
    pub force: bool,

    /// Target directory (defaults to current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

#[derive(Debug, serde::Serialize)]
pub(crate) struct InitOutput {
    pub success: bool,
    pub message: String,
    pub initialized_path: PathBuf,
    pub files_created: Vec<String>,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![self.message.clone()];
        if !self.files_created.is_empty() {
            lines.push("\nCreated:".to_string());
            for file in &self.files_created {
                lines.push(format!("  - {file}"));
            }
        }
        lines.join("\n")
    }
}

/// Write the starter config files.
pub async fn execute(args: InitArgs, json_mode: bool) -> Result<()> {
    let target_path = if args.path.is_absolute() {
        args.path.clone()
    } else {
        std::env::current_dir()
            .context("Failed to get current directory")?
            .join(&args.path)
    };
    let config_dir = target_path.join(CONFIG_DIR);
    let config_file = config_dir.join("config.yaml");

    if config_file.exists() && !args.force {
        let output_data = InitOutput {
            success: false,
            message: "Project already initialized. Use --force to overwrite.".to_string(),
            initialized_path: target_path,
            files_created: vec![],
        };
        output(&output_data, json_mode);
        return Ok(());
    }

    fs::create_dir_all(&config_dir)
        .await
        .with_context(|| format!("Failed to create {}", config_dir.display()))?;

    let yaml = serde_yaml::to_string(&Config::default()).context("Failed to render default config")?;
    fs::write(&config_file, format!("{CONFIG_HEADER}{yaml}"))
        .await
        .with_context(|| format!("Failed to write {}", config_file.display()))?;
    let mut files_created = vec![format!("{CONFIG_DIR}/config.yaml")];

    let rules_file = config_dir.join("rules.yaml");
    if !rules_file.exists() {
        fs::write(&rules_file, RULES_TEMPLATE)
            .await
            .with_context(|| format!("Failed to write {}", rules_file.display()))?;
        files_created.push(format!("{CONFIG_DIR}/rules.yaml"));
    }

    let output_data = InitOutput {
        success: true,
        message: format!("Initialized autofix in {}", target_path.display()),
        initialized_path: target_path,
        files_created,
    };
    output(&output_data, json_mode);
    Ok(())
}
