//! Fix results, tiers and outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use super::classified_error::ClassifiedError;

/// Cost tier of a fix strategy, in escalation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixTier {
    /// Free pattern fixes: installs, config templates, port kills.
    Deterministic,
    /// Cheap LLM call with single-file search/replace output.
    Haiku,
    /// Expensive LLM call with multi-file output.
    Sonnet,
}

impl FixTier {
    /// Lowercase tier name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Deterministic => "deterministic",
            Self::Haiku => "haiku",
            Self::Sonnet => "sonnet",
        }
    }

    /// Nominal per-call cost in USD, used when usage data is unavailable.
    pub const fn nominal_cost(self) -> f64 {
        match self {
            Self::Deterministic => 0.0,
            Self::Haiku => 0.001,
            Self::Sonnet => 0.01,
        }
    }
}

impl fmt::Display for FixTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of change a fix made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixType {
    /// A shell command ran (install, port kill).
    Command,
    /// A new file was written.
    FileCreate,
    /// An existing file was changed.
    FileEdit,
    /// A config file was generated from a template.
    Config,
    /// Nothing was changed (failed or inapplicable fix).
    None,
}

/// Result of one strategy invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixResult {
    /// Tier that produced this result.
    pub tier: FixTier,
    /// The strategy believes it fixed the error.
    pub success: bool,
    /// Kind of change made.
    pub fix_type: FixType,
    /// Project-relative paths written.
    pub files_modified: Vec<PathBuf>,
    /// Shell command executed, if any.
    pub command_run: Option<String>,
    /// Why the strategy failed.
    pub error: Option<String>,
    /// Wall time spent in the strategy.
    pub time_ms: u64,
    /// USD spent on this attempt.
    pub cost: f64,
}

impl FixResult {
    /// A failed attempt that changed nothing.
    pub fn failure(tier: FixTier, error: impl Into<String>) -> Self {
        Self {
            tier,
            success: false,
            fix_type: FixType::None,
            files_modified: Vec::new(),
            command_run: None,
            error: Some(error.into()),
            time_ms: 0,
            cost: 0.0,
        }
    }

    /// A successful attempt of the given kind.
    pub fn success(tier: FixTier, fix_type: FixType) -> Self {
        Self {
            tier,
            success: true,
            fix_type,
            files_modified: Vec::new(),
            command_run: None,
            error: None,
            time_ms: 0,
            cost: 0.0,
        }
    }

    /// Record the files this fix wrote.
    #[must_use]
    pub fn with_files(mut self, files: Vec<PathBuf>) -> Self {
        self.files_modified = files;
        self
    }

    /// Record the shell command that ran.
    #[must_use]
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command_run = Some(command.into());
        self
    }

    /// Set the elapsed time in milliseconds.
    #[must_use]
    pub const fn with_time(mut self, time_ms: u64) -> Self {
        self.time_ms = time_ms;
        self
    }

    /// Set the USD cost.
    #[must_use]
    pub const fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }
}

/// One recorded attempt at fixing an error fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixAttempt {
    /// Hash of the leading characters of the error text.
    pub fingerprint: String,
    /// When the attempt finished.
    pub attempted_at: DateTime<Utc>,
    /// Last tier that ran, if any.
    pub tier: Option<FixTier>,
    /// Whether the attempt fixed the error.
    pub success: bool,
}

/// Why a fix was not attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    /// The per-project fix window is exhausted or cooling down.
    RateLimited(String),
    /// The same error already consumed its attempt budget.
    LoopDetected(String),
    /// The error needs manual intervention.
    NotFixable(String),
    /// The same error window was seen too many times in this run.
    Duplicate(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited(detail) => write!(f, "rate limited: {detail}"),
            Self::LoopDetected(detail) => write!(f, "loop detected: {detail}"),
            Self::NotFixable(detail) => write!(f, "not fixable: {detail}"),
            Self::Duplicate(detail) => write!(f, "duplicate: {detail}"),
        }
    }
}

/// Final state of one `fix_error` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FixStatus {
    /// A tier reported success.
    Fixed {
        /// The tier that fixed it.
        tier: FixTier,
    },
    /// Every applicable tier failed.
    Failed,
    /// No tier was tried.
    Skipped {
        /// Why nothing was tried.
        skip: SkipReason,
    },
}

impl FixStatus {
    /// A tier reported success.
    pub const fn is_fixed(&self) -> bool {
        matches!(self, Self::Fixed { .. })
    }

    /// No tier was tried.
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}

/// Everything the executor learned and did for one error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixOutcome {
    /// How the error was classified.
    pub classified: ClassifiedError,
    /// Final state.
    pub status: FixStatus,
    /// Results in the order the tiers ran.
    pub results: Vec<FixResult>,
    /// USD summed over all results.
    pub total_cost: f64,
    /// Wall time for the whole `fix_error` call.
    pub total_time_ms: u64,
    /// Output of the restart command, when one ran after a successful fix.
    pub restart_output: Option<String>,
}

impl FixOutcome {
    pub(crate) fn skipped(classified: ClassifiedError, skip: SkipReason) -> Self {
        Self {
            classified,
            status: FixStatus::Skipped { skip },
            results: Vec::new(),
            total_cost: 0.0,
            total_time_ms: 0,
            restart_output: None,
        }
    }

    /// The per-project rate limit turned this error away.
    pub const fn is_rate_limited(&self) -> bool {
        matches!(
            self.status,
            FixStatus::Skipped {
                skip: SkipReason::RateLimited(_)
            }
        )
    }

    /// Files touched by any successful tier.
    pub fn files_modified(&self) -> Vec<PathBuf> {
        self.results
            .iter()
            .filter(|r| r.success)
            .flat_map(|r| r.files_modified.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_escalate_in_order() {
        assert!(FixTier::Deterministic < FixTier::Haiku);
        assert!(FixTier::Haiku < FixTier::Sonnet);
        assert!(FixTier::Sonnet.nominal_cost() > FixTier::Haiku.nominal_cost());
    }

    #[test]
    fn failure_changes_nothing() {
        let result = FixResult::failure(FixTier::Haiku, "no json in response");
        assert!(!result.success);
        assert_eq!(result.fix_type, FixType::None);
        assert!(result.files_modified.is_empty());
        assert_eq!(result.error.as_deref(), Some("no json in response"));
    }

    #[test]
    fn skip_reason_serializes_tagged() {
        let status = FixStatus::Skipped {
            skip: SkipReason::NotFixable("free port 3000".into()),
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "skipped");
        assert_eq!(json["skip"]["reason"], "not_fixable");
    }
}
