//! Routes one error through the fix tiers.
//!
//! Order: classify, per-project rate limit, loop prevention, Tier 1, the
//! LLM gate, context building, Tier 2, Tier 3. A successful fix may be
//! followed by the configured restart command.

use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, instrument, warn};

use crate::domain::models::{
    ClassifiedError, Config, FixContext, FixEvent, FixEventType, FixOutcome, FixResult, FixStatus,
    Language, SkipReason,
};
use crate::domain::ports::{CommandRunner, LlmClient, ProjectFilesFactory};
use crate::services::classifier::{ClassifierError, ErrorClassifier};
use crate::services::context_engine::ContextEngine;
use crate::services::cost_tracker::CostTracker;
use crate::services::fix_history::FixHistory;
use crate::services::fix_rate_limiter::FixRateLimiter;
use crate::services::strategies::{
    elapsed_ms, DeterministicStrategy, FixStrategy, HaikuStrategy, SonnetStrategy,
};

const AGENT: &str = "executor";

/// Where one fix runs.
#[derive(Debug, Clone, Copy)]
pub struct FixScope<'a> {
    /// Rate limit and cost key.
    pub project_id: &'a str,
    /// Absolute project root.
    pub root: &'a Path,
    /// Detected once per run and reused for every window.
    pub language: Language,
    /// Run attempt recorded on emitted events.
    pub step: u32,
    /// A later window of a batch whose earlier window already passed the
    /// cooldown; only the window cap is checked.
    pub batched: bool,
}

/// Classifies errors and runs the fix tiers for them.
pub struct FixExecutor {
    classifier: Arc<ErrorClassifier>,
    context_engine: ContextEngine,
    deterministic: Arc<dyn FixStrategy>,
    llm_tiers: Vec<Arc<dyn FixStrategy>>,
    rate_limiter: FixRateLimiter,
    history: FixHistory,
    costs: CostTracker,
    runner: Arc<dyn CommandRunner>,
    restart_command: Option<String>,
    restart_timeout: Duration,
    events: Option<UnboundedSender<FixEvent>>,
}

impl FixExecutor {
    /// Wire the executor from configuration.
    ///
    /// Without an LLM client (or with `executor.enable_ai` off) only the
    /// deterministic tier runs.
    pub fn new(
        config: &Config,
        runner: Arc<dyn CommandRunner>,
        llm: Option<Arc<dyn LlmClient>>,
        files: ProjectFilesFactory,
    ) -> Result<Self, ClassifierError> {
        let classifier = Arc::new(ErrorClassifier::from_config(&config.classifier)?);
        let deterministic: Arc<dyn FixStrategy> = Arc::new(DeterministicStrategy::new(
            runner.clone(),
            files.clone(),
            &config.strategies,
            config.executor.install_timeout_secs,
        ));
        let llm_tiers: Vec<Arc<dyn FixStrategy>> = match llm {
            Some(llm) if config.executor.enable_ai => vec![
                Arc::new(HaikuStrategy::new(llm.clone(), files.clone())),
                Arc::new(SonnetStrategy::new(llm, files)),
            ],
            _ => Vec::new(),
        };

        Ok(Self {
            classifier,
            context_engine: ContextEngine::new(config.context.clone()),
            deterministic,
            llm_tiers,
            rate_limiter: FixRateLimiter::new(&config.fix_limits),
            history: FixHistory::new(&config.fix_limits),
            costs: CostTracker::new(),
            runner,
            restart_command: config.executor.restart_command.clone(),
            restart_timeout: Duration::from_secs(config.executor.command_timeout_secs),
            events: None,
        })
    }

    /// Stream progress events to `sender`.
    #[must_use]
    pub fn with_events(mut self, sender: UnboundedSender<FixEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// Share a rate limiter with other executors in this process.
    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: FixRateLimiter) -> Self {
        self.rate_limiter = limiter;
        self
    }

    /// The classifier in use.
    pub fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    /// Spend so far.
    pub const fn costs(&self) -> &CostTracker {
        &self.costs
    }

    /// Attempt history used for loop detection.
    pub const fn history(&self) -> &FixHistory {
        &self.history
    }

    /// Whether the LLM tiers are wired in.
    pub fn ai_enabled(&self) -> bool {
        !self.llm_tiers.is_empty()
    }

    /// Check the project rate limit, cooldown included.
    pub async fn can_attempt_fix(&self, project_id: &str) -> (bool, String) {
        self.rate_limiter.can_attempt_fix(project_id).await
    }

    pub(crate) fn emit(&self, event_type: FixEventType, agent: &str, step: u32, data: serde_json::Value) {
        if let Some(events) = &self.events {
            // A closed receiver only means nobody is listening any more.
            let _ = events.send(FixEvent::new(event_type, agent, step, data));
        }
    }

    /// Classify `raw_error` for a project whose language is already known.
    pub fn classify(&self, raw_error: &str, language: Language) -> ClassifiedError {
        self.classifier.classify_for(raw_error, None, None, language)
    }

    /// Classify and try to fix one raw error.
    pub async fn fix_error(&self, project_id: &str, root: &Path, raw_error: &str) -> FixOutcome {
        let scope = FixScope {
            project_id,
            root,
            language: ContextEngine::detect_language_async(root).await,
            step: 1,
            batched: false,
        };
        self.fix_in_scope(&scope, raw_error).await
    }

    /// [`Self::fix_error`] with the language, step and batch position
    /// supplied by the caller.
    #[instrument(skip(self, scope, raw_error), fields(project_id = %scope.project_id, step = scope.step))]
    pub async fn fix_in_scope(&self, scope: &FixScope<'_>, raw_error: &str) -> FixOutcome {
        let started = Instant::now();
        let (project_id, root, step) = (scope.project_id, scope.root, scope.step);
        let classified = self.classify(raw_error, scope.language);
        self.emit(
            FixEventType::ErrorClassified,
            AGENT,
            step,
            json!({
                "error_type": classified.error_type,
                "category": classified.category,
                "file": classified.file_path,
                "fixable": classified.is_claude_fixable,
                "confidence": classified.confidence,
            }),
        );

        let (allowed, reason) = if scope.batched {
            self.rate_limiter.within_window_cap(project_id).await
        } else {
            self.rate_limiter.can_attempt_fix(project_id).await
        };
        if !allowed {
            return self.skip(classified, SkipReason::RateLimited(reason), step);
        }
        let (allowed, reason) = self.history.should_attempt(raw_error).await;
        if !allowed {
            return self.skip(classified, SkipReason::LoopDetected(reason), step);
        }
        self.rate_limiter.record_attempt(project_id).await;

        let mut results: Vec<FixResult> = Vec::new();
        let mut status = FixStatus::Failed;

        if self.deterministic.can_handle(&classified) {
            let context = FixContext::new(root, classified.language, raw_error);
            let result = self.run_tier(self.deterministic.as_ref(), &classified, &context, step).await;
            if result.success {
                status = FixStatus::Fixed { tier: result.tier };
            }
            results.push(result);
        }

        if !status.is_fixed() {
            let (call_llm, reason) = self.classifier.should_call_claude(&classified);
            if !call_llm {
                status = FixStatus::Skipped {
                    skip: SkipReason::NotFixable(reason),
                };
            } else if self.llm_tiers.is_empty() {
                if results.is_empty() {
                    status = FixStatus::Skipped {
                        skip: SkipReason::NotFixable("LLM tiers are disabled".to_string()),
                    };
                }
            } else {
                let context = self
                    .context_engine
                    .build_context(root, &classified, raw_error)
                    .await;
                debug!(
                    files = context.files().count(),
                    bytes = context.total_bytes(),
                    "Built fix context"
                );
                for tier in &self.llm_tiers {
                    if !tier.can_handle(&classified) {
                        continue;
                    }
                    let result = self.run_tier(tier.as_ref(), &classified, &context, step).await;
                    let fixed = result.success;
                    if fixed {
                        status = FixStatus::Fixed { tier: result.tier };
                    }
                    results.push(result);
                    if fixed {
                        break;
                    }
                }
            }
        }

        if !results.is_empty() {
            let last_tier = results.last().map(|r| r.tier);
            self.history.record(raw_error, last_tier, status.is_fixed()).await;
        }
        for result in &results {
            self.costs.record(project_id, result).await;
        }

        let restart_output = if status.is_fixed() {
            self.restart(root, step).await
        } else {
            None
        };

        let total_cost: f64 = results.iter().map(|r| r.cost).sum();
        let outcome = FixOutcome {
            classified,
            status,
            results,
            total_cost,
            total_time_ms: elapsed_ms(started),
            restart_output,
        };

        match &outcome.status {
            FixStatus::Fixed { tier } => {
                info!(
                    error_type = %outcome.classified.error_type,
                    tier = %tier,
                    cost = outcome.total_cost,
                    "Error fixed"
                );
                self.emit(
                    FixEventType::FixApplied,
                    AGENT,
                    step,
                    json!({
                        "tier": tier,
                        "files": outcome.files_modified(),
                        "cost": outcome.total_cost,
                    }),
                );
            }
            FixStatus::Failed => {
                warn!(
                    error_type = %outcome.classified.error_type,
                    tiers = outcome.results.len(),
                    cost = outcome.total_cost,
                    "All fix tiers failed"
                );
                self.emit(
                    FixEventType::FixFailed,
                    AGENT,
                    step,
                    json!({
                        "error_type": outcome.classified.error_type,
                        "errors": outcome.results.iter().filter_map(|r| r.error.clone()).collect::<Vec<_>>(),
                    }),
                );
            }
            FixStatus::Skipped { skip } => {
                info!(error_type = %outcome.classified.error_type, reason = %skip, "Fix skipped");
                self.emit(FixEventType::FixSkipped, AGENT, step, json!({ "reason": skip }));
            }
        }
        outcome
    }

    async fn run_tier(
        &self,
        strategy: &dyn FixStrategy,
        classified: &ClassifiedError,
        context: &FixContext,
        step: u32,
    ) -> FixResult {
        debug!(tier = %strategy.tier(), strategy = strategy.name(), "Trying fix tier");
        let result = strategy.fix(classified, context).await;
        if !result.success {
            debug!(
                tier = %result.tier,
                error = result.error.as_deref().unwrap_or("-"),
                "Fix tier failed"
            );
            self.emit(
                FixEventType::FixFailed,
                strategy.name(),
                step,
                json!({ "tier": result.tier, "error": result.error, "cost": result.cost }),
            );
        }
        result
    }

    async fn restart(&self, root: &Path, step: u32) -> Option<String> {
        let command = self.restart_command.as_deref()?;
        info!(command = %command, "Running restart command");
        let output = match self.runner.run(command, root, self.restart_timeout).await {
            Ok(output) => output,
            Err(e) => {
                warn!(error = %e, "Restart command failed to start");
                return Some(e.to_string());
            }
        };
        self.emit(
            FixEventType::Restarted,
            AGENT,
            step,
            json!({ "command": command, "exit_code": output.exit_code }),
        );
        Some(output.combined())
    }

    fn skip(&self, classified: ClassifiedError, skip: SkipReason, step: u32) -> FixOutcome {
        info!(error_type = %classified.error_type, reason = %skip, "Fix skipped");
        self.emit(FixEventType::FixSkipped, AGENT, step, json!({ "reason": skip }));
        FixOutcome::skipped(classified, skip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::FixTier;
    use crate::domain::ports::{CommandOutput, Completion, CompletionRequest, LlmError, ProcessError};
    use crate::infrastructure::files::FsProjectFiles;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    struct ExitRunner(i32);

    #[async_trait]
    impl CommandRunner for ExitRunner {
        async fn run(&self, _: &str, _: &Path, _: Duration) -> Result<CommandOutput, ProcessError> {
            Ok(CommandOutput {
                exit_code: Some(self.0),
                ..CommandOutput::default()
            })
        }
    }

    #[derive(Default)]
    struct CountingLlm(AtomicUsize);

    #[async_trait]
    impl LlmClient for CountingLlm {
        async fn complete(&self, _: CompletionRequest) -> Result<Completion, LlmError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(LlmError::RequestFailed("offline".into()))
        }
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.fix_limits.cooldown_secs = 0;
        config
    }

    fn executor(exit: i32, llm: Option<Arc<dyn LlmClient>>) -> FixExecutor {
        FixExecutor::new(&config(), Arc::new(ExitRunner(exit)), llm, FsProjectFiles::factory()).unwrap()
    }

    #[tokio::test]
    async fn dependency_fixed_by_tier_one() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("package.json"), "{}").unwrap();
        let llm = Arc::new(CountingLlm::default());
        let executor = executor(0, Some(llm.clone()));

        let outcome = executor
            .fix_error("web", dir.path(), "Error: Cannot find module 'express'")
            .await;

        assert_eq!(outcome.status, FixStatus::Fixed { tier: FixTier::Deterministic });
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(
            outcome.results[0].command_run.as_deref(),
            Some("npm install express")
        );
        assert_eq!(llm.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn operational_errors_are_skipped() {
        let dir = TempDir::new().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let executor = executor(0, None).with_events(tx);

        let outcome = executor
            .fix_error("web", dir.path(), "getaddrinfo ENOTFOUND registry.npmjs.org")
            .await;

        assert!(matches!(
            outcome.status,
            FixStatus::Skipped { skip: SkipReason::NotFixable(_) }
        ));
        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(event.event_type);
        }
        assert_eq!(kinds, vec![FixEventType::ErrorClassified, FixEventType::FixSkipped]);
    }

    #[tokio::test]
    async fn llm_failures_escalate_then_fail() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.js"), "console.log('x';\n").unwrap();
        let llm = Arc::new(CountingLlm::default());
        let executor = executor(0, Some(llm.clone()));

        let outcome = executor
            .fix_error(
                "web",
                dir.path(),
                "index.js:1\nSyntaxError: missing ) after argument list",
            )
            .await;

        assert_eq!(outcome.status, FixStatus::Failed);
        assert!(llm.0.load(Ordering::SeqCst) >= 1);
        assert_eq!(outcome.results.last().map(|r| r.tier), Some(FixTier::Sonnet));
    }

    #[tokio::test]
    async fn repeated_errors_hit_loop_prevention() {
        let dir = TempDir::new().unwrap();
        let executor = executor(1, None);
        let message = "Error: Cannot find module 'left-padd'";

        for _ in 0..3 {
            let outcome = executor.fix_error("web", dir.path(), message).await;
            assert_eq!(outcome.status, FixStatus::Failed);
        }
        let outcome = executor.fix_error("web", dir.path(), message).await;
        assert!(matches!(
            outcome.status,
            FixStatus::Skipped { skip: SkipReason::LoopDetected(_) }
        ));
    }
}
