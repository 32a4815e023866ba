//! Implementation of the `autofix classify` command.

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use serde::Serialize;
use std::path::PathBuf;

use super::read_arg_or_stdin;
use crate::cli::output::{detail_table, output, CommandOutput};
use crate::domain::models::{ClassifiedError, Config, Language};
use crate::services::{ContextEngine, ErrorClassifier};

/// Arguments for `autofix classify`.
#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// Error message to classify (`-` reads stdin)
    pub message: String,

    /// File whose contents are classified together with the message
    #[arg(long)]
    pub stderr_file: Option<PathBuf>,

    /// Exit code of the failed command
    #[arg(long, allow_negative_numbers = true)]
    pub exit_code: Option<i32>,

    /// Project directory used to detect the language
    #[arg(long)]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ClassifyOutput {
    #[serde(flatten)]
    pub classified: ClassifiedError,
    pub should_call_claude: bool,
    pub reason: String,
}

impl CommandOutput for ClassifyOutput {
    fn to_human(&self) -> String {
        let c = &self.classified;
        let location = match (&c.file_path, c.line_number) {
            (Some(file), Some(line)) => format!("{file}:{line}"),
            (Some(file), None) => file.clone(),
            _ => "-".to_string(),
        };
        let fixable = if c.is_claude_fixable {
            style("yes").green().to_string()
        } else {
            style("no").red().to_string()
        };
        let mut rows = vec![
            ("Type", format!("{} ({})", c.error_type, c.category)),
            ("Language", c.language.to_string()),
            ("Fixable", fixable),
            ("Confidence", format!("{:.2}", c.confidence)),
            ("Location", location),
            ("Rule", c.rule_id.clone().unwrap_or_else(|| "-".to_string())),
            ("Action", c.suggested_action.clone()),
            ("Claude", self.reason.clone()),
        ];
        for (key, value) in &c.extracted_context {
            if !matches!(key.as_str(), "file" | "line") {
                rows.push((key.as_str(), value.clone()));
            }
        }
        detail_table(&rows).to_string()
    }
}

/// Classify one error and print the result.
pub async fn execute(args: ClassifyArgs, config: &Config, json_mode: bool) -> Result<()> {
    let classifier =
        ErrorClassifier::from_config(&config.classifier).context("Failed to load classifier rules")?;
    let message = read_arg_or_stdin(&args.message).await?;
    let stderr = match &args.stderr_file {
        Some(path) => Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?,
        ),
        None => None,
    };
    let language = args
        .dir
        .as_deref()
        .map_or(Language::Unknown, ContextEngine::detect_language);

    let classified = classifier.classify_for(&message, stderr.as_deref(), args.exit_code, language);
    let (should_call_claude, reason) = classifier.should_call_claude(&classified);

    output(
        &ClassifyOutput {
            classified,
            should_call_claude,
            reason,
        },
        json_mode,
    );
    Ok(())
}
