use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::errors::ProcessError;

/// Captured result of a shell command.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was killed or timed out.
    pub exit_code: Option<i32>,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
    /// Wall time.
    pub duration_ms: u64,
    /// The timeout killed the process.
    pub timed_out: bool,
}

impl CommandOutput {
    /// Exited with code 0 and did not time out.
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    /// Stdout followed by stderr, as the error scanner sees it.
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (true, _) => self.stderr.clone(),
            (_, true) => self.stdout.clone(),
            _ => format!("{}\n{}", self.stdout, self.stderr),
        }
    }
}

/// Port for executing shell commands with a hard timeout.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` through the shell in `cwd`, killing it after `timeout`.
    async fn run(
        &self,
        command: &str,
        cwd: &Path,
        timeout: Duration,
    ) -> Result<CommandOutput, ProcessError>;
}
