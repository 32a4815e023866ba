//! Wiring of the services behind the CLI commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;

use crate::domain::models::{Config, FixEvent};
use crate::domain::ports::{CommandRunner, LlmClient, LlmError};
use crate::domain::{DomainError, DomainResult};
use crate::infrastructure::claude::{ClaudeClient, ClaudeClientConfig};
use crate::infrastructure::files::FsProjectFiles;
use crate::infrastructure::process::ShellCommandRunner;
use crate::services::{FixExecutor, UniversalAutoFixer};

/// Services for one CLI invocation.
pub struct App {
    pub config: Config,
    pub runner: Arc<dyn CommandRunner>,
    pub executor: Arc<FixExecutor>,
}

impl App {
    /// Build the executor; the LLM tiers are attached only when `use_ai`
    /// is set and an API key is available.
    pub fn build(
        config: Config,
        use_ai: bool,
        events: Option<UnboundedSender<FixEvent>>,
    ) -> DomainResult<Self> {
        let runner: Arc<dyn CommandRunner> = Arc::new(ShellCommandRunner::new());
        let llm = if use_ai && config.executor.enable_ai {
            Self::llm_client(&config)?
        } else {
            None
        };

        let mut executor = FixExecutor::new(&config, runner.clone(), llm, FsProjectFiles::factory())
            .map_err(|e| DomainError::InvalidRules(e.to_string()))?;
        if let Some(events) = events {
            executor = executor.with_events(events);
        }

        Ok(Self {
            config,
            runner,
            executor: Arc::new(executor),
        })
    }

    fn llm_client(config: &Config) -> DomainResult<Option<Arc<dyn LlmClient>>> {
        match ClaudeClientConfig::from_settings(&config.claude) {
            Ok(client_config) => {
                let client = ClaudeClient::new(client_config).map_err(LlmError::from)?;
                Ok(Some(Arc::new(client)))
            }
            Err(LlmError::NotConfigured(reason)) => {
                warn!(reason = %reason, "No Claude API key; only deterministic fixes will run");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn auto_fixer(&self) -> UniversalAutoFixer {
        UniversalAutoFixer::new(
            self.executor.clone(),
            self.runner.clone(),
            self.config.executor.clone(),
        )
    }
}

/// Absolute project directory for `--dir`.
pub fn resolve_dir(dir: &Path) -> DomainResult<PathBuf> {
    let absolute = if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| DomainError::ValidationFailed(format!("cannot read current directory: {e}")))?
            .join(dir)
    };
    if !absolute.is_dir() {
        return Err(DomainError::ValidationFailed(format!(
            "{} is not a directory",
            absolute.display()
        )));
    }
    Ok(absolute)
}

/// Project id for rate limiting: the explicit one, else the directory name.
pub fn project_id(explicit: Option<&str>, dir: &Path) -> String {
    explicit
        .map(str::to_string)
        .or_else(|| dir.file_name().and_then(|n| n.to_str()).map(str::to_string))
        .unwrap_or_else(|| "default".to_string())
}
