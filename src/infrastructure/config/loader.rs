//! Figment-based config loading and validation.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Project-local configuration directory
pub const CONFIG_DIR: &str = ".autofix";

/// Largest accepted `executor.context_window_lines`
pub const MAX_CONTEXT_WINDOW_LINES: usize = 500;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    /// `claude.rate_limit_rps` is not positive.
    #[error("Invalid rate limit: {0}. Must be positive")]
    InvalidRateLimit(f64),

    /// Unknown log level.
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    /// Unknown log format.
    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    /// Unknown log rotation.
    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidLogRotation(String),

    /// Too many retries.
    #[error("Invalid max_retries: {0}. Cannot be 0")]
    InvalidMaxRetries(u32),

    /// Initial backoff exceeds the maximum.
    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    /// `classifier.min_confidence` outside `0.0..=1.0`.
    #[error("Invalid min_confidence: {0}. Must be between 0.0 and 1.0")]
    InvalidConfidence(f32),

    /// A limit that must be positive is zero.
    #[error("Invalid {0}: must be at least 1")]
    ZeroLimit(&'static str),

    /// Context window radius above [`MAX_CONTEXT_WINDOW_LINES`].
    #[error("Invalid executor.context_window_lines: {0}. Must be at most 500")]
    InvalidWindowLines(usize),

    /// `strategies.allowed_commands` is empty.
    #[error("strategies.allowed_command_prefixes cannot be empty")]
    EmptyAllowList,
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for the current directory.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .autofix/config.yaml (project config, created by init)
    /// 3. .autofix/local.yaml (project local overrides, optional)
    /// 4. Environment variables (AUTOFIX_* prefix, `__` separates nesting)
    pub fn load() -> Result<Config> {
        Self::load_in(Path::new("."))
    }

    /// Same as [`Self::load`] with the project files resolved under `project_dir`.
    pub fn load_in(project_dir: &Path) -> Result<Config> {
        let dir = project_dir.join(CONFIG_DIR);
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed("AUTOFIX_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honouring
    /// environment overrides.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        if !path.is_file() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed("AUTOFIX_").split("__"))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidLogRotation(
                config.logging.rotation.clone(),
            ));
        }

        let claude = &config.claude;
        if claude.rate_limit_rps <= 0.0 || claude.rate_limit_rps.is_nan() {
            return Err(ConfigError::InvalidRateLimit(claude.rate_limit_rps));
        }

        if claude.max_retries == 0 {
            return Err(ConfigError::InvalidMaxRetries(claude.max_retries));
        }

        if claude.initial_backoff_ms >= claude.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                claude.initial_backoff_ms,
                claude.max_backoff_ms,
            ));
        }

        let confidence = config.classifier.min_confidence;
        if !(0.0..=1.0).contains(&confidence) {
            return Err(ConfigError::InvalidConfidence(confidence));
        }

        if config.executor.max_attempts == 0 {
            return Err(ConfigError::ZeroLimit("executor.max_attempts"));
        }

        if config.executor.context_window_lines > MAX_CONTEXT_WINDOW_LINES {
            return Err(ConfigError::InvalidWindowLines(
                config.executor.context_window_lines,
            ));
        }

        if config.fix_limits.max_fixes_per_window == 0 {
            return Err(ConfigError::ZeroLimit("fix_limits.max_fixes_per_window"));
        }

        if config.fix_limits.window_secs == 0 {
            return Err(ConfigError::ZeroLimit("fix_limits.window_secs"));
        }

        if config.fix_limits.max_attempts_per_error == 0 {
            return Err(ConfigError::ZeroLimit("fix_limits.max_attempts_per_error"));
        }

        if config.context.max_context_files == 0 {
            return Err(ConfigError::ZeroLimit("context.max_context_files"));
        }

        if config
            .strategies
            .allowed_command_prefixes
            .iter()
            .all(|p| p.trim().is_empty())
        {
            return Err(ConfigError::EmptyAllowList);
        }

        Ok(())
    }
}
