//! Common test utilities for integration tests
//!
//! Provides scripted ports (LLM and command runner) and config helpers
//! shared by the integration test files.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use autofix::domain::ports::{
    CommandOutput, CommandRunner, Completion, CompletionRequest, LlmClient, LlmError, ProcessError,
};
use autofix::infrastructure::files::FsProjectFiles;
use autofix::{Config, FixExecutor};

/// Create a temporary directory for test isolation
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Write `content` to `rel` under `dir`, creating parent directories.
pub fn write_file(dir: &Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create parent dir");
    }
    std::fs::write(path, content).expect("Failed to write file");
}

/// Setup test logging
///
/// Call this at the beginning of tests that need logging.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Default config with every delay and cooldown turned off.
pub fn fast_config() -> Config {
    let mut config = Config::default();
    config.fix_limits.cooldown_secs = 0;
    config.executor.retry_delay_ms = 0;
    config
}

pub fn output(exit_code: i32, stdout: &str, stderr: &str) -> CommandOutput {
    CommandOutput {
        exit_code: Some(exit_code),
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
        ..CommandOutput::default()
    }
}

/// Command runner that answers from per-command queues.
///
/// Each command pops its next scripted output; once a queue is drained the
/// last output repeats. Unscripted commands exit 0 with no output.
#[derive(Default)]
pub struct ScriptedRunner {
    scripts: Mutex<HashMap<String, VecDeque<CommandOutput>>>,
    last: Mutex<HashMap<String, CommandOutput>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, command: &str, outputs: Vec<CommandOutput>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(command.to_string(), outputs.into());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, command: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == command).count()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(
        &self,
        command: &str,
        _cwd: &Path,
        _timeout: Duration,
    ) -> Result<CommandOutput, ProcessError> {
        self.calls.lock().unwrap().push(command.to_string());

        let next = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(command)
            .and_then(VecDeque::pop_front);
        let mut last = self.last.lock().unwrap();
        let out = match next {
            Some(out) => {
                last.insert(command.to_string(), out.clone());
                out
            }
            None => last
                .get(command)
                .cloned()
                .unwrap_or_else(|| output(0, "", "")),
        };
        Ok(out)
    }
}

/// LLM that hands out canned answers in order and records every request.
#[derive(Default)]
pub struct MockLlm {
    answers: Mutex<VecDeque<Result<String, String>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(self, text: &str) -> Self {
        self.answers.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    pub fn fail(self, message: &str) -> Self {
        self.answers
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, LlmError> {
        let model = format!("claude-{}-4-5", request.model.as_str());
        self.requests.lock().unwrap().push(request);
        match self.answers.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(Completion {
                text,
                model,
                input_tokens: 1_000,
                output_tokens: 200,
            }),
            Some(Err(message)) => Err(LlmError::RequestFailed(message)),
            None => Err(LlmError::RequestFailed("no scripted answer".to_string())),
        }
    }
}

/// Executor over the real filesystem with scripted runner and LLM.
pub fn executor(
    config: &Config,
    runner: Arc<ScriptedRunner>,
    llm: Option<Arc<MockLlm>>,
) -> FixExecutor {
    let llm = llm.map(|l| l as Arc<dyn LlmClient>);
    FixExecutor::new(config, runner, llm, FsProjectFiles::factory())
        .expect("built-in rules load")
}
