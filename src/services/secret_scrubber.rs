//! Redaction of credentials from text that leaves the process.

use regex::{Captures, Regex};
use std::sync::LazyLock;

static API_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:sk-ant-[A-Za-z0-9_-]{10,}|sk-[A-Za-z0-9]{20,}|AKIA[0-9A-Z]{16}|gh[pousr]_[A-Za-z0-9]{30,}|xox[baprs]-[A-Za-z0-9-]{10,})")
        .expect("valid regex")
});
static BEARER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Bearer\s+[A-Za-z0-9\-_.=]+").expect("valid regex"));
static ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)(["']?[\w.-]*(?:api[_-]?key|apikey|token|secret|password|passwd)["']?\s*[:=]\s*)["']?([^"'\s,}]{4,})["']?"#,
    )
    .expect("valid regex")
});
static URL_CREDENTIALS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([a-z][a-z0-9+.-]*://[^:/\s@]+:)[^@/\s]+@").expect("valid regex")
});

/// Scrubs API keys, bearer tokens, secret assignments and URL passwords.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretScrubber;

impl SecretScrubber {
    /// Scrubber over the built-in patterns.
    pub const fn new() -> Self {
        Self
    }

    /// Replace keys, tokens and passwords in `text` with a marker.
    pub fn scrub(&self, text: &str) -> String {
        let scrubbed = API_KEY.replace_all(text, "[API_KEY_REDACTED]");
        let scrubbed = BEARER.replace_all(&scrubbed, "Bearer [TOKEN_REDACTED]");
        let scrubbed = URL_CREDENTIALS.replace_all(&scrubbed, "${1}[REDACTED]@");
        let scrubbed = ASSIGNMENT.replace_all(&scrubbed, |caps: &Captures| {
            if caps[2].contains("REDACTED") {
                caps[0].to_string()
            } else {
                format!("{}[REDACTED]", &caps[1])
            }
        });
        scrubbed.into_owned()
    }
}
