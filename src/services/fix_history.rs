//! Loop prevention: remembers what was tried for each error fingerprint.

use chrono::Utc;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::models::{FixAttempt, FixLimitsConfig, FixTier};

/// Hash of the first `chars` characters of `message`, as 16 hex digits.
///
/// Errors that differ only after the prefix share a fingerprint.
pub fn fingerprint(message: &str, chars: usize) -> String {
    let prefix: String = message.trim().chars().take(chars).collect();
    let mut hasher = DefaultHasher::new();
    prefix.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Fix attempts keyed by error fingerprint.
#[derive(Debug, Clone)]
pub struct FixHistory {
    attempts: Arc<RwLock<HashMap<String, Vec<FixAttempt>>>>,
    max_attempts_per_error: usize,
    fingerprint_chars: usize,
}

impl FixHistory {
    /// Empty history sized from `limits`.
    pub fn new(limits: &FixLimitsConfig) -> Self {
        Self {
            attempts: Arc::new(RwLock::new(HashMap::new())),
            max_attempts_per_error: limits.max_attempts_per_error as usize,
            fingerprint_chars: limits.fingerprint_chars,
        }
    }

    /// Stable fingerprint of the leading characters of `message`.
    pub fn fingerprint(&self, message: &str) -> String {
        fingerprint(message, self.fingerprint_chars)
    }

    /// Whether another attempt is allowed for this error, with the reason
    /// when it is not.
    pub async fn should_attempt(&self, message: &str) -> (bool, String) {
        let key = self.fingerprint(message);
        let attempts = self.attempts.read().await;
        let tried = attempts.get(&key).map_or(0, Vec::len);
        if tried >= self.max_attempts_per_error {
            (
                false,
                format!("Same error already attempted {tried} times (fingerprint {key})"),
            )
        } else {
            (true, "OK".to_string())
        }
    }

    /// Record one attempt for `message`.
    pub async fn record(&self, message: &str, tier: Option<FixTier>, success: bool) {
        let key = self.fingerprint(message);
        self.attempts
            .write()
            .await
            .entry(key.clone())
            .or_default()
            .push(FixAttempt {
                fingerprint: key,
                attempted_at: Utc::now(),
                tier,
                success,
            });
    }

    /// Attempts recorded for `message`, oldest first.
    pub async fn attempts_for(&self, message: &str) -> Vec<FixAttempt> {
        let key = self.fingerprint(message);
        self.attempts
            .read()
            .await
            .get(&key)
            .cloned()
            .unwrap_or_default()
    }

    /// Forget an error, e.g. once it stops appearing.
    pub async fn clear(&self, message: &str) {
        let key = self.fingerprint(message);
        self.attempts.write().await.remove(&key);
    }
}
