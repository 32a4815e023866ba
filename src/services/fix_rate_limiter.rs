//! Per-project fix throttling.
//!
//! Each project keeps a sliding window of attempt timestamps. An attempt
//! is allowed when the cooldown since the previous one has passed and the
//! window holds fewer than `max_fixes_per_window` attempts.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::domain::models::FixLimitsConfig;

/// Reason returned when an attempt is allowed.
pub const ALLOWED: &str = "OK";

/// Per-project sliding window of fix attempts with a cooldown.
#[derive(Debug, Clone)]
pub struct FixRateLimiter {
    attempts: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
    cooldown: Duration,
    window: Duration,
    max_per_window: usize,
}

impl FixRateLimiter {
    /// Limiter using the window, cap and cooldown from `limits`.
    pub fn new(limits: &FixLimitsConfig) -> Self {
        Self {
            attempts: Arc::new(Mutex::new(HashMap::new())),
            cooldown: Duration::from_secs(limits.cooldown_secs),
            window: Duration::from_secs(limits.window_secs),
            max_per_window: limits.max_fixes_per_window as usize,
        }
    }

    /// Whether `project_id` may start another fix, with the reason when not.
    pub async fn can_attempt_fix(&self, project_id: &str) -> (bool, String) {
        self.check(project_id, true).await
    }

    /// Like [`Self::can_attempt_fix`] without the cooldown.
    ///
    /// Used for the later windows of one batch: the batch passed the
    /// cooldown once, and each window still counts against the window cap.
    pub async fn within_window_cap(&self, project_id: &str) -> (bool, String) {
        self.check(project_id, false).await
    }

    async fn check(&self, project_id: &str, cooldown: bool) -> (bool, String) {
        let mut attempts = self.attempts.lock().await;
        let Some(history) = attempts.get_mut(project_id) else {
            return (true, ALLOWED.to_string());
        };

        let now = Instant::now();
        prune(history, now, self.window);

        if let Some(last) = history.back().filter(|_| cooldown) {
            let since = now.duration_since(*last);
            if since < self.cooldown {
                let wait = self.cooldown - since;
                return (
                    false,
                    format!("Cooldown active, retry in {:.1}s", wait.as_secs_f64()),
                );
            }
        }

        if history.len() >= self.max_per_window {
            return (
                false,
                format!(
                    "Rate limit reached: {} fixes in the last {}s",
                    history.len(),
                    self.window.as_secs()
                ),
            );
        }

        (true, ALLOWED.to_string())
    }

    /// Record that a fix attempt started now.
    pub async fn record_attempt(&self, project_id: &str) {
        let mut attempts = self.attempts.lock().await;
        let history = attempts.entry(project_id.to_string()).or_default();
        let now = Instant::now();
        prune(history, now, self.window);
        history.push_back(now);
        debug!(project_id = %project_id, in_window = history.len(), "Recorded fix attempt");
    }

    /// Attempts currently inside the window.
    pub async fn attempts_in_window(&self, project_id: &str) -> usize {
        let mut attempts = self.attempts.lock().await;
        attempts.get_mut(project_id).map_or(0, |history| {
            prune(history, Instant::now(), self.window);
            history.len()
        })
    }

    /// Forget every attempt recorded for `project_id`.
    pub async fn reset(&self, project_id: &str) {
        self.attempts.lock().await.remove(project_id);
    }
}

fn prune(history: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while history
        .front()
        .is_some_and(|t| now.duration_since(*t) >= window)
    {
        history.pop_front();
    }
}
