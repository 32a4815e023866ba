//! Implementation of the `autofix fix` command.

use anyhow::Result;
use clap::Args;
use console::style;
use serde::Serialize;
use std::path::PathBuf;

use super::read_arg_or_stdin;
use crate::cli::app::{project_id, resolve_dir, App};
use crate::cli::output::{create_spinner, list_table, output, truncate, CommandOutput, ProgressBarExt};
use crate::domain::models::{Config, FixOutcome, FixResult, FixStatus};

/// Arguments for `autofix fix`.
#[derive(Args, Debug)]
pub struct FixArgs {
    /// Error text to fix (`-` reads stdin)
    pub error: String,

    /// Project directory
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,

    /// Project id used for rate limiting (defaults to the directory name)
    #[arg(long)]
    pub project_id: Option<String>,

    /// Only run deterministic fixes
    #[arg(long)]
    pub no_ai: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct FixOutput {
    pub project_id: String,
    #[serde(flatten)]
    pub outcome: FixOutcome,
}

pub(crate) fn status_line(status: &FixStatus) -> String {
    match status {
        FixStatus::Fixed { tier } => format!("{} by the {tier} tier", style("Fixed").green().bold()),
        FixStatus::Failed => style("Not fixed").red().bold().to_string(),
        FixStatus::Skipped { skip } => format!("{} ({skip})", style("Skipped").yellow().bold()),
    }
}

pub(crate) fn results_table(results: &[FixResult]) -> String {
    let mut table = list_table(&["tier", "result", "change", "cost", "detail"]);
    for result in results {
        let detail = if result.success {
            result
                .command_run
                .clone()
                .unwrap_or_else(|| {
                    result
                        .files_modified
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                })
        } else {
            result.error.clone().unwrap_or_default()
        };
        table.add_row(vec![
            result.tier.to_string(),
            if result.success { "ok".into() } else { "failed".into() },
            format!("{:?}", result.fix_type).to_lowercase(),
            format!("${:.4}", result.cost),
            truncate(&detail, 80),
        ]);
    }
    table.to_string()
}

impl CommandOutput for FixOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("{} {}", style("Error:").bold(), self.outcome.classified.summary()),
            status_line(&self.outcome.status),
        ];
        if !self.outcome.results.is_empty() {
            lines.push(String::new());
            lines.push(results_table(&self.outcome.results));
        }
        lines.push(format!(
            "\nCost: ${:.4} in {} ms",
            self.outcome.total_cost, self.outcome.total_time_ms
        ));
        if let Some(restart) = &self.outcome.restart_output {
            lines.push(format!("Restart output:\n{}", truncate(restart, 400)));
        }
        lines.join("\n")
    }
}

/// Run the fix tiers for one error.
pub async fn execute(args: FixArgs, config: Config, json_mode: bool) -> Result<()> {
    let dir = resolve_dir(&args.dir)?;
    let project_id = project_id(args.project_id.as_deref(), &dir);
    let error = read_arg_or_stdin(&args.error).await?;
    let app = App::build(config, !args.no_ai, None)?;

    let spinner = create_spinner(json_mode);
    spinner.set_message("Fixing error");
    let outcome = app.executor.fix_error(&project_id, &dir, &error).await;
    if outcome.status.is_fixed() {
        spinner.finish_success("Done");
    } else {
        spinner.finish_error("Done");
    }

    output(&FixOutput { project_id, outcome }, json_mode);
    Ok(())
}
