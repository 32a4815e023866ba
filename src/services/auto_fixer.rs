//! Run a command, fix what breaks, run it again.

use regex::Regex;
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::models::{ExecutorConfig, FixEventType, FixOutcome, Language, SkipReason};
use crate::domain::ports::{CommandOutput, CommandRunner, ProcessError};
use crate::services::context_engine::ContextEngine;
use crate::services::fix_executor::{FixExecutor, FixScope};
use crate::services::fix_history::fingerprint;

const AGENT: &str = "auto_fixer";
const DUPLICATE_FINGERPRINT_CHARS: usize = 200;
const TAIL_LINES: usize = 40;

/// Lines that look like an error even when the command exited 0.
static ERROR_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        \b(?:Syntax|Type|Reference|Range|Module\w*|Import|Attribute|Name|Key|Value|Index)Error\b
        | \bError:\s
        | \berror(?:\[E\d+\])?:\s
        | \berror\ [A-Z]{2,}\d+:
        | \[ERROR\]
        | ^\s*ERROR\b
        | \bFATAL\b | \bfatal:\s
        | Traceback\ \(most\ recent\ call\ last\)
        | \bException\b
        | \bpanicked\ at\b
        | \bnpm\ ERR!
        | \bFailed\ to\ compile\b
        | \bCannot\ find\ (?:module|package|symbol)\b
        | \bModule\ not\ found\b
        | \bE(?:ADDRINUSE|NOENT|ACCES|CONNREFUSED)\b
        | \bBUILD\ FAILED\b | \bBUILD\ FAILURE\b
        | \bcompilation\ failed\b
        ",
    )
    .expect("valid regex")
});

/// Lines that mention errors without being one ("0 errors", "error_handler.js").
static BENIGN_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:0|no)\s+errors?\b|\bwithout\s+errors?\b|\berrors?:\s*0\b").expect("valid regex")
});

/// Summary of one `run_with_autofix` call.
#[derive(Debug, Clone, Serialize)]
pub struct AutoFixReport {
    /// Identifier shared by every event of this run.
    pub run_id: Uuid,
    /// The last run of the command showed no errors.
    pub success: bool,
    /// Number of times the command ran.
    pub attempts: u32,
    /// Every fix outcome, in order.
    pub fixes: Vec<FixOutcome>,
    /// USD spent across the run.
    pub total_cost: f64,
    /// Last lines of the final run's output.
    pub output_tail: String,
    /// The loop gave up because every error it saw was a suppressed repeat.
    pub stopped_early: bool,
}

impl AutoFixReport {
    /// Outcomes that ended fixed.
    pub fn fixes_applied(&self) -> usize {
        self.fixes.iter().filter(|f| f.status.is_fixed()).count()
    }
}

/// Outcomes of one `fix_all_errors` pass.
#[derive(Debug, Clone, Default)]
pub struct FixBatch {
    /// One outcome per attempted or suppressed window.
    pub outcomes: Vec<FixOutcome>,
    /// Windows found in the output.
    pub windows: usize,
    /// Windows skipped as repeats.
    pub suppressed: usize,
    /// Windows turned away by the per-project rate limit; these do not
    /// count as repeats.
    pub rate_limited: usize,
}

impl FixBatch {
    /// Every window was a repeat, so the loop should stop.
    pub fn all_suppressed(&self) -> bool {
        self.windows > 0 && self.suppressed == self.windows
    }
}

/// Runs a command, fixes what fails and runs it again.
pub struct UniversalAutoFixer {
    executor: Arc<FixExecutor>,
    runner: Arc<dyn CommandRunner>,
    config: ExecutorConfig,
    seen_windows: Mutex<HashMap<String, u32>>,
}

impl UniversalAutoFixer {
    /// Auto-fixer over `executor`, running commands with `runner`.
    pub fn new(executor: Arc<FixExecutor>, runner: Arc<dyn CommandRunner>, config: ExecutorConfig) -> Self {
        Self {
            executor,
            runner,
            config,
            seen_windows: Mutex::new(HashMap::new()),
        }
    }

    /// The executor used for each window.
    pub fn executor(&self) -> &FixExecutor {
        &self.executor
    }

    /// Indices of lines that look like errors.
    pub fn find_error_lines(output: &str) -> Vec<usize> {
        output
            .lines()
            .enumerate()
            .filter(|(_, line)| ERROR_LINE.is_match(line) && !BENIGN_LINE.is_match(line))
            .map(|(i, _)| i)
            .collect()
    }

    /// The ±`radius` line windows around each error line.
    ///
    /// An error line already inside the previous window does not open a new
    /// one, so a stack trace yields one window rather than one per frame.
    pub fn error_windows(output: &str, radius: usize) -> Vec<String> {
        let lines: Vec<&str> = output.lines().collect();
        let mut windows = Vec::new();
        let mut covered_until: Option<usize> = None;

        for index in Self::find_error_lines(output) {
            if covered_until.is_some_and(|end| index <= end) {
                continue;
            }
            let start = index.saturating_sub(radius);
            let end = index.saturating_add(radius).min(lines.len().saturating_sub(1));
            windows.push(lines[start..=end].join("\n"));
            covered_until = Some(end);
        }
        windows
    }

    /// Whether a run's output needs fixing: a failing exit code, or error
    /// lines in the output of a run that claims success.
    pub fn has_errors(output: &CommandOutput) -> bool {
        !output.success() || !Self::find_error_lines(&output.combined()).is_empty()
    }

    /// Fix every error window in `output`, one `fix_error` call per window.
    ///
    /// A window seen `duplicate_threshold` times in this run is skipped.
    pub async fn fix_all_errors(&self, project_id: &str, root: &Path, output: &str) -> Vec<FixOutcome> {
        let language = ContextEngine::detect_language_async(root).await;
        self.fix_windows(project_id, root, language, output, 1).await.outcomes
    }

    async fn fix_windows(
        &self,
        project_id: &str,
        root: &Path,
        language: Language,
        output: &str,
        step: u32,
    ) -> FixBatch {
        let mut windows = Self::error_windows(output, self.config.context_window_lines);
        if windows.is_empty() && !output.trim().is_empty() {
            windows.push(tail(output, 2 * self.config.context_window_lines + 1));
        }

        let mut batch = FixBatch {
            windows: windows.len(),
            ..FixBatch::default()
        };
        let mut scope = FixScope {
            project_id,
            root,
            language,
            step,
            batched: false,
        };
        for window in windows {
            let key = fingerprint(&window, DUPLICATE_FINGERPRINT_CHARS);
            let repeats = self.seen_windows.lock().await.get(&key).copied().unwrap_or(0) + 1;
            if repeats > self.config.duplicate_threshold {
                batch.suppressed += 1;
                let classified = self.executor.classify(&window, language);
                let skip = SkipReason::Duplicate(format!("seen {repeats} times in this run"));
                self.executor.emit(
                    FixEventType::FixSkipped,
                    AGENT,
                    step,
                    json!({ "reason": skip, "error_type": classified.error_type }),
                );
                batch.outcomes.push(FixOutcome::skipped(classified, skip));
                continue;
            }

            let outcome = self.executor.fix_in_scope(&scope, &window).await;
            if outcome.is_rate_limited() {
                batch.rate_limited += 1;
            } else {
                self.seen_windows.lock().await.insert(key, repeats);
                scope.batched = true;
            }
            batch.outcomes.push(outcome);
        }
        batch
    }

    /// Run `command` until it succeeds or `max_attempts` runs are used,
    /// fixing the errors of each failed run in between.
    #[instrument(skip(self, root), fields(project_id = %project_id))]
    pub async fn run_with_autofix(
        &self,
        project_id: &str,
        root: &Path,
        command: &str,
        max_attempts: Option<u32>,
    ) -> Result<AutoFixReport, ProcessError> {
        let max_attempts = max_attempts.unwrap_or(self.config.max_attempts).max(1);
        let timeout = Duration::from_secs(self.config.command_timeout_secs);
        let delay = Duration::from_millis(self.config.retry_delay_ms);
        self.seen_windows.lock().await.clear();
        let language = ContextEngine::detect_language_async(root).await;

        let mut report = AutoFixReport {
            run_id: Uuid::new_v4(),
            success: false,
            attempts: 0,
            fixes: Vec::new(),
            total_cost: 0.0,
            output_tail: String::new(),
            stopped_early: false,
        };

        for attempt in 1..=max_attempts {
            report.attempts = attempt;
            self.executor.emit(
                FixEventType::AttemptStarted,
                AGENT,
                attempt,
                json!({
                    "run_id": report.run_id,
                    "command": command,
                    "max_attempts": max_attempts,
                }),
            );
            info!(attempt, max_attempts, command = %command, "Running command");

            let output = self.runner.run(command, root, timeout).await?;
            let combined = output.combined();
            report.output_tail = tail(&combined, TAIL_LINES);

            if !Self::has_errors(&output) {
                report.success = true;
                info!(attempt, "Command succeeded");
                break;
            }

            let error_lines = Self::find_error_lines(&combined).len();
            self.executor.emit(
                FixEventType::ErrorsDetected,
                AGENT,
                attempt,
                json!({
                    "exit_code": output.exit_code,
                    "timed_out": output.timed_out,
                    "error_lines": error_lines,
                }),
            );
            warn!(attempt, exit_code = ?output.exit_code, error_lines, "Command reported errors");

            let batch = self
                .fix_windows(project_id, root, language, &combined, attempt)
                .await;
            let stop = batch.all_suppressed();
            report.fixes.extend(batch.outcomes);
            if stop {
                warn!(attempt, "Every error was a suppressed repeat; stopping");
                report.stopped_early = true;
                break;
            }
            if attempt < max_attempts && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        report.total_cost = report.fixes.iter().map(|f| f.total_cost).sum();
        self.executor.emit(
            FixEventType::RunCompleted,
            AGENT,
            report.attempts,
            json!({
                "run_id": report.run_id,
                "success": report.success,
                "attempts": report.attempts,
                "fixes_applied": report.fixes_applied(),
                "total_cost": report.total_cost,
            }),
        );
        info!(
            success = report.success,
            attempts = report.attempts,
            fixes = report.fixes_applied(),
            cost = report.total_cost,
            "Auto-fix run finished"
        );
        Ok(report)
    }
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_error_lines_and_ignores_benign_ones() {
        let output = "compiling...\nsrc/a.ts(3,1): error TS2304: Cannot find name 'x'.\nFound 0 errors\nSyntaxError: Unexpected token\ndone";
        assert_eq!(UniversalAutoFixer::find_error_lines(output), vec![1, 3]);
    }

    #[test]
    fn windows_cover_neighbouring_lines_once() {
        let output = (0..20)
            .map(|i| if i == 5 || i == 6 { format!("Error: boom {i}") } else { format!("line {i}") })
            .collect::<Vec<_>>()
            .join("\n");

        let windows = UniversalAutoFixer::error_windows(&output, 2);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].lines().next(), Some("line 3"));
        assert_eq!(windows[0].lines().count(), 5);
    }

    #[test]
    fn huge_radius_takes_the_whole_output() {
        let output = "a\nError: boom\nb";
        let windows = UniversalAutoFixer::error_windows(output, usize::MAX);
        assert_eq!(windows, vec![output.to_string()]);
    }

    #[test]
    fn exit_zero_with_error_text_still_has_errors() {
        let clean = CommandOutput {
            exit_code: Some(0),
            stdout: "compiled successfully".into(),
            ..CommandOutput::default()
        };
        let noisy = CommandOutput {
            exit_code: Some(0),
            stdout: "Failed to compile.\nModule not found: Error: Can't resolve './App'".into(),
            ..CommandOutput::default()
        };
        assert!(!UniversalAutoFixer::has_errors(&clean));
        assert!(UniversalAutoFixer::has_errors(&noisy));
    }

    #[test]
    fn tail_keeps_last_lines() {
        assert_eq!(tail("a\nb\nc", 2), "b\nc");
        assert_eq!(tail("a", 5), "a");
    }
}
