//! Configuration model, one struct per YAML section.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure for autofix
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Claude API configuration
    #[serde(default)]
    pub claude: ClaudeConfig,

    /// Error classifier configuration
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Per-project fix rate limits and loop prevention
    #[serde(default)]
    pub fix_limits: FixLimitsConfig,

    /// Auto-fix loop configuration
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Tier 1 strategy configuration
    #[serde(default)]
    pub strategies: StrategiesConfig,

    /// Project context scanning limits
    #[serde(default)]
    pub context: ContextConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files (stderr only when unset)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Log file rotation: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,

    /// Number of days to retain logs
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

const fn default_retention_days() -> u32 {
    30
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
            retention_days: default_retention_days(),
        }
    }
}

/// Claude API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ClaudeConfig {
    /// API key (falls back to the ANTHROPIC_API_KEY environment variable)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL for the API (for testing/proxies)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Requests per second allowed against the API
    #[serde(default = "default_rate_limit_rps")]
    pub rate_limit_rps: f64,

    /// Maximum number of retry attempts for transient errors
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Model ids per tier alias
    #[serde(default)]
    pub models: ModelsConfig,
}

fn default_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

const fn default_rate_limit_rps() -> f64 {
    5.0
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    2_000
}

const fn default_max_backoff_ms() -> u64 {
    60_000
}

const fn default_timeout_secs() -> u64 {
    120
}

impl Default for ClaudeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            rate_limit_rps: default_rate_limit_rps(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            timeout_secs: default_timeout_secs(),
            models: ModelsConfig::default(),
        }
    }
}

impl ClaudeConfig {
    /// Configured key, or the ANTHROPIC_API_KEY environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
            .filter(|k| !k.is_empty())
    }
}

/// Model ids for the haiku / sonnet / opus aliases
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ModelsConfig {
    /// Model id for the cheap tier
    #[serde(default = "default_haiku_model")]
    pub haiku: String,

    /// Model id for the multi-file tier
    #[serde(default = "default_sonnet_model")]
    pub sonnet: String,

    /// Model id for the `opus` alias
    #[serde(default = "default_opus_model")]
    pub opus: String,
}

fn default_haiku_model() -> String {
    "claude-haiku-4-5".to_string()
}

fn default_sonnet_model() -> String {
    "claude-sonnet-4-5".to_string()
}

fn default_opus_model() -> String {
    "claude-opus-4-1".to_string()
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            haiku: default_haiku_model(),
            sonnet: default_sonnet_model(),
            opus: default_opus_model(),
        }
    }
}

/// Error classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ClassifierConfig {
    /// Extra YAML rule file, merged ahead of the built-in rules
    #[serde(default)]
    pub rules_file: Option<PathBuf>,

    /// Minimum confidence for dispatching an error to Claude
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,

    /// Whether unmatched errors are considered fixable
    #[serde(default = "default_true")]
    pub unknown_is_fixable: bool,

    /// Container path prefixes stripped from extracted file paths
    #[serde(default = "default_strip_prefixes")]
    pub strip_path_prefixes: Vec<String>,

    /// Prefix added to Java sources rooted at `src/main/java/`
    #[serde(default = "default_java_source_prefix")]
    pub java_source_prefix: Option<String>,
}

const fn default_min_confidence() -> f32 {
    0.3
}

const fn default_true() -> bool {
    true
}

fn default_strip_prefixes() -> Vec<String> {
    vec!["/app/".to_string(), "/workspace/".to_string()]
}

#[allow(clippy::unnecessary_wraps)]
fn default_java_source_prefix() -> Option<String> {
    Some("backend/".to_string())
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            rules_file: None,
            min_confidence: default_min_confidence(),
            unknown_is_fixable: default_true(),
            strip_path_prefixes: default_strip_prefixes(),
            java_source_prefix: default_java_source_prefix(),
        }
    }
}

/// Per-project rate limits and loop prevention
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FixLimitsConfig {
    /// Minimum seconds between two fix attempts on one project
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Maximum fix attempts per project inside `window_secs`
    #[serde(default = "default_max_fixes_per_window")]
    pub max_fixes_per_window: u32,

    /// Length of the sliding window in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Attempts allowed for one identical error fingerprint
    #[serde(default = "default_max_attempts_per_error")]
    pub max_attempts_per_error: u32,

    /// Number of leading message characters hashed into a fingerprint
    #[serde(default = "default_fingerprint_chars")]
    pub fingerprint_chars: usize,
}

const fn default_cooldown_secs() -> u64 {
    2
}

const fn default_max_fixes_per_window() -> u32 {
    20
}

const fn default_window_secs() -> u64 {
    300
}

const fn default_max_attempts_per_error() -> u32 {
    3
}

const fn default_fingerprint_chars() -> usize {
    200
}

impl Default for FixLimitsConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: default_cooldown_secs(),
            max_fixes_per_window: default_max_fixes_per_window(),
            window_secs: default_window_secs(),
            max_attempts_per_error: default_max_attempts_per_error(),
            fingerprint_chars: default_fingerprint_chars(),
        }
    }
}

/// Auto-fix loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExecutorConfig {
    /// Maximum run/fix cycles for `run_with_autofix`
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed delay between cycles in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Timeout for the monitored command in seconds
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    /// Timeout for dependency installs in seconds
    #[serde(default = "default_install_timeout_secs")]
    pub install_timeout_secs: u64,

    /// Lines of output kept on each side of an error line
    #[serde(default = "default_context_window_lines")]
    pub context_window_lines: usize,

    /// Repeats of one error window tolerated before it is suppressed
    #[serde(default = "default_duplicate_threshold")]
    pub duplicate_threshold: u32,

    /// Command run after a successful fix (e.g. restarting a dev server)
    #[serde(default)]
    pub restart_command: Option<String>,

    /// Whether the LLM tiers may be used
    #[serde(default = "default_true")]
    pub enable_ai: bool,
}

const fn default_max_attempts() -> u32 {
    10
}

const fn default_retry_delay_ms() -> u64 {
    2_000
}

const fn default_command_timeout_secs() -> u64 {
    600
}

const fn default_install_timeout_secs() -> u64 {
    120
}

const fn default_context_window_lines() -> usize {
    5
}

const fn default_duplicate_threshold() -> u32 {
    3
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            command_timeout_secs: default_command_timeout_secs(),
            install_timeout_secs: default_install_timeout_secs(),
            context_window_lines: default_context_window_lines(),
            duplicate_threshold: default_duplicate_threshold(),
            restart_command: None,
            enable_ai: default_true(),
        }
    }
}

/// Tier 1 strategy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StrategiesConfig {
    /// Command prefixes the deterministic tier may execute
    #[serde(default = "default_allowed_prefixes")]
    pub allowed_command_prefixes: Vec<String>,

    /// Timeout for generic deterministic commands in seconds
    #[serde(default = "default_command_secs")]
    pub command_timeout_secs: u64,
}

fn default_allowed_prefixes() -> Vec<String> {
    [
        "npm install",
        "npm i ",
        "yarn add",
        "pnpm add",
        "pip install",
        "pip3 install",
        "poetry add",
        "go get",
        "go mod tidy",
        "cargo add",
        "composer require",
        "composer install",
        "gem install",
        "bundle install",
        "dart pub add",
        "flutter pub add",
        "dotnet add package",
        "lsof -ti",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

const fn default_command_secs() -> u64 {
    60
}

impl Default for StrategiesConfig {
    fn default() -> Self {
        Self {
            allowed_command_prefixes: default_allowed_prefixes(),
            command_timeout_secs: default_command_secs(),
        }
    }
}

/// Project context scanning limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ContextConfig {
    /// Maximum files visited by a project scan
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    /// Maximum files attached to one fix prompt
    #[serde(default = "default_max_context_files")]
    pub max_context_files: usize,

    /// Maximum total bytes of file content attached to one fix prompt
    #[serde(default = "default_max_context_bytes")]
    pub max_context_bytes: usize,
}

const fn default_max_files() -> usize {
    2_000
}

const fn default_max_context_files() -> usize {
    8
}

const fn default_max_context_bytes() -> usize {
    60_000
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_files: default_max_files(),
            max_context_files: default_max_context_files(),
            max_context_bytes: default_max_context_bytes(),
        }
    }
}
