//! Implementation of the `autofix run` command.

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use indicatif::ProgressBar;
use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::mpsc;

use super::fix::status_line;
use crate::cli::app::{project_id, resolve_dir, App};
use crate::cli::output::{create_spinner, output, CommandOutput, ProgressBarExt};
use crate::domain::models::{Config, FixEvent, FixEventType};
use crate::services::AutoFixReport;

/// Arguments for `autofix run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Command to run, e.g. `npm run build`
    #[arg(required = true, trailing_var_arg = true, num_args = 1..)]
    pub command: Vec<String>,

    /// Project directory
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,

    /// Project id used for rate limiting (defaults to the directory name)
    #[arg(long)]
    pub project_id: Option<String>,

    /// Maximum runs of the command (defaults to executor.max_attempts)
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Only run deterministic fixes
    #[arg(long)]
    pub no_ai: bool,

    /// Print progress events as JSON lines
    #[arg(long)]
    pub events: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct RunOutput {
    pub project_id: String,
    pub command: String,
    #[serde(flatten)]
    pub report: AutoFixReport,
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        let report = &self.report;
        let headline = if report.success {
            style(format!("`{}` succeeded", self.command)).green().bold()
        } else {
            style(format!("`{}` still failing", self.command)).red().bold()
        };
        let mut lines = vec![format!(
            "{headline} after {} attempt(s), {} fix(es) applied, ${:.4} spent",
            report.attempts,
            report.fixes_applied(),
            report.total_cost
        )];
        if report.stopped_early {
            lines.push("Stopped early: only repeated errors were left.".to_string());
        }
        for fix in &report.fixes {
            lines.push(format!(
                "  - {}: {}",
                fix.classified.summary(),
                status_line(&fix.status)
            ));
        }
        if !report.success && !report.output_tail.is_empty() {
            lines.push(format!("\nLast output:\n{}", report.output_tail));
        }
        lines.join("\n")
    }
}

fn describe(event: &FixEvent) -> Option<String> {
    let data = &event.data;
    match event.event_type {
        FixEventType::AttemptStarted => Some(format!("Attempt {}: running command", event.step)),
        FixEventType::ErrorsDetected => Some(format!(
            "Attempt {}: {} error line(s), fixing",
            event.step, data["error_lines"]
        )),
        FixEventType::FixApplied => Some(format!("Fixed with {}", data["tier"])),
        FixEventType::FixFailed if data["tier"].is_string() => {
            Some(format!("{} tier failed", data["tier"]))
        }
        FixEventType::FixSkipped => Some(format!("Skipped ({})", data["reason"])),
        FixEventType::Restarted => Some("Restarted".to_string()),
        _ => None,
    }
}

/// Runs the command; `Ok(false)` means it was still failing at the end.
pub async fn execute(args: RunArgs, config: Config, json_mode: bool) -> Result<bool> {
    let dir = resolve_dir(&args.dir)?;
    let project_id = project_id(args.project_id.as_deref(), &dir);
    let command = args.command.join(" ");

    let (tx, mut rx) = mpsc::unbounded_channel::<FixEvent>();
    let app = App::build(config, !args.no_ai, Some(tx))?;
    let fixer = app.auto_fixer();

    let spinner = create_spinner(json_mode || args.events);
    let print_events = args.events;
    let progress: ProgressBar = spinner.clone();
    let listener = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if print_events {
                if let Ok(line) = serde_json::to_string(&event) {
                    println!("{line}");
                }
            } else if let Some(message) = describe(&event) {
                progress.set_message(message);
            }
        }
    });

    let result = fixer
        .run_with_autofix(&project_id, &dir, &command, args.max_attempts)
        .await;
    drop(fixer);
    drop(app);
    listener.await.context("Event listener task failed")?;

    let report = result.with_context(|| format!("Failed to run `{command}`"))?;
    if report.success {
        spinner.finish_success("Command succeeded");
    } else {
        spinner.finish_error("Command still failing");
    }

    let success = report.success;
    if !args.events {
        output(
            &RunOutput {
                project_id,
                command,
                report,
            },
            json_mode,
        );
    }
    Ok(success)
}
