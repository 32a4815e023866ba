//! File/line extraction and path normalisation.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use super::rules::LocationRule;
use crate::domain::models::config::ClassifierConfig;

static MAVEN_ERROR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\[ERROR\]\s+(?P<file>(?:[A-Za-z]:)?[^\s\[\]]+\.java):\[(?P<line>\d+),(?P<col>\d+)\]\s*(?P<message>[^\n]*)",
    )
    .expect("valid regex")
});

/// Where an error points to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    /// Path as printed by the tool
    pub file: String,
    /// 1-based line
    pub line: Option<u32>,
    /// 1-based column
    pub column: Option<u32>,
    /// Extra facts found alongside the location (Maven `symbol:` lines, ...).
    pub extra: BTreeMap<String, String>,
}

/// Two-pass extractor for `mvn` compiler output.
///
/// Pass one finds `[ERROR] <path>.java:[line,col] message`; pass two reads
/// the `symbol:` / `location:` continuation lines that follow it.
pub fn extract_maven(text: &str) -> Option<Location> {
    let caps = MAVEN_ERROR.captures(text)?;
    let whole = caps.get(0)?;

    let mut extra = BTreeMap::new();
    if let Some(message) = caps.name("message") {
        let message = message.as_str().trim();
        if !message.is_empty() {
            extra.insert("detail".to_string(), message.to_string());
        }
    }

    for raw in text[whole.end()..].lines().skip(1).take(6) {
        let line = raw.trim_start_matches("[ERROR]").trim();
        if line.is_empty() || line.starts_with("[INFO]") || line.starts_with("->") {
            break;
        }
        if MAVEN_ERROR.is_match(raw) {
            break;
        }
        if let Some(symbol) = line.strip_prefix("symbol:") {
            extra.insert("symbol".to_string(), symbol.trim().to_string());
        } else if let Some(location) = line.strip_prefix("location:") {
            extra.insert("location".to_string(), location.trim().to_string());
        }
    }

    Some(Location {
        file: caps["file"].to_string(),
        line: caps["line"].parse().ok(),
        column: caps["col"].parse().ok(),
        extra,
    })
}

/// Try each location rule in order and return the first project file found.
pub fn find_location(text: &str, rules: &[LocationRule]) -> Option<Location> {
    rules.iter().find_map(|rule| {
        let mut candidates = rule
            .regex()
            .captures_iter(text)
            .filter(|caps| caps.name("file").is_some_and(|f| is_project_path(f.as_str())));

        let caps = if rule.last {
            candidates.last()
        } else {
            candidates.next()
        }?;

        Some(Location {
            file: caps.name("file")?.as_str().to_string(),
            line: caps.name("line").and_then(|m| m.as_str().parse().ok()),
            column: caps.name("col").and_then(|m| m.as_str().parse().ok()),
            extra: BTreeMap::new(),
        })
    })
}

/// Paths that belong to toolchains or installed packages, not the project.
fn is_project_path(path: &str) -> bool {
    const FOREIGN: [&str; 7] = [
        "node_modules/",
        "site-packages/",
        "dist-packages/",
        "/.cargo/registry/",
        "/rustc/",
        "/usr/lib/",
        "/usr/local/lib/",
    ];
    const FOREIGN_PREFIXES: [&str; 3] = ["node:", "internal/", "<frozen"];

    !FOREIGN.iter().any(|marker| path.contains(marker))
        && !FOREIGN_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

/// Rewrites container paths into project-relative ones.
#[derive(Debug, Clone, Default)]
pub struct PathNormalizer {
    strip_prefixes: Vec<String>,
    java_source_prefix: Option<String>,
}

impl PathNormalizer {
    /// Resolver that strips `strip_prefixes` and maps bare Java paths under `java_source_prefix`.
    pub fn new(strip_prefixes: Vec<String>, java_source_prefix: Option<String>) -> Self {
        Self {
            strip_prefixes,
            java_source_prefix: java_source_prefix.filter(|p| !p.is_empty()),
        }
    }

    /// Resolver configured from the classifier section.
    pub fn from_config(config: &ClassifierConfig) -> Self {
        Self::new(
            config.strip_path_prefixes.clone(),
            config.java_source_prefix.clone(),
        )
    }

    /// Strip the first matching container prefix, then put Java sources
    /// under the configured backend directory.
    pub fn normalize(&self, raw: &str) -> String {
        let mut path = raw.trim().trim_matches(|c| c == '"' || c == '\'');

        if let Some(rest) = self
            .strip_prefixes
            .iter()
            .find_map(|prefix| path.strip_prefix(prefix.as_str()))
        {
            path = rest;
        }
        path = path.trim_start_matches("./");

        match &self.java_source_prefix {
            Some(prefix)
                if (path.starts_with("src/main/java/") || path.starts_with("src/test/java/"))
                    && !path.starts_with(prefix.as_str()) =>
            {
                format!("{prefix}{path}")
            }
            _ => path.to_string(),
        }
    }
}
