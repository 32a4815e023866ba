//! Progress events streamed while fixes run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of a [`FixEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixEventType {
    /// The monitored command is about to run.
    AttemptStarted,
    /// A run produced error output.
    ErrorsDetected,
    /// One error window was classified.
    ErrorClassified,
    /// A tier fixed an error.
    FixApplied,
    /// A tier, or all tiers, failed.
    FixFailed,
    /// An error was not attempted.
    FixSkipped,
    /// The restart command ran after a fix.
    Restarted,
    /// `run_with_autofix` finished.
    RunCompleted,
}

/// A timestamped event for streaming to a frontend or log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixEvent {
    /// What happened
    #[serde(rename = "type")]
    pub event_type: FixEventType,
    /// Event-specific payload.
    pub data: serde_json::Value,
    /// When the event was created.
    pub timestamp: DateTime<Utc>,
    /// Component that emitted the event (`auto_fixer`, `executor`, a tier name).
    pub agent: String,
    /// Attempt number inside the current run, starting at 1.
    pub step: u32,
}

impl FixEvent {
    /// Stamp a new event with the current time.
    pub fn new(
        event_type: FixEventType,
        agent: impl Into<String>,
        step: u32,
        data: serde_json::Value,
    ) -> Self {
        Self {
            event_type,
            data,
            timestamp: Utc::now(),
            agent: agent.into(),
            step,
        }
    }
}
