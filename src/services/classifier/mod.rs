//! Rule-based error classifier.
//!
//! [`ErrorClassifier::classify`] turns raw error text into a
//! [`ClassifiedError`]. Non-fixable rules are tried first, then fixable
//! rules; the first match wins. Classification never fails: text no rule
//! recognises becomes an `unknown` error.

mod location;
pub mod package;
pub mod rules;

use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::debug;

pub use location::{extract_maven, find_location, Location, PathNormalizer};
pub use rules::{ClassifierError, LocationRule, Rule, RuleSet};

use crate::domain::models::config::ClassifierConfig;
use crate::domain::models::{ClassifiedError, ErrorCategory, ErrorType, Language};

static TEMPLATE_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{(\w+)\}").expect("valid regex"));

/// Classifies raw build/runtime error text.
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    rules: RuleSet,
    paths: PathNormalizer,
    min_confidence: f32,
    unknown_is_fixable: bool,
}

impl ErrorClassifier {
    /// Classifier over an already compiled rule set.
    pub fn new(rules: RuleSet, config: &ClassifierConfig) -> Self {
        Self {
            rules,
            paths: PathNormalizer::from_config(config),
            min_confidence: config.min_confidence,
            unknown_is_fixable: config.unknown_is_fixable,
        }
    }

    /// Classifier over the embedded rules with default settings.
    pub fn builtin() -> Result<Self, ClassifierError> {
        Self::from_config(&ClassifierConfig::default())
    }

    /// Built-in rules, with `config.rules_file` (if any) tried first.
    pub fn from_config(config: &ClassifierConfig) -> Result<Self, ClassifierError> {
        let mut rules = RuleSet::builtin()?;
        if let Some(path) = &config.rules_file {
            rules = rules.with_overrides(RuleSet::load(path)?);
        }
        Ok(Self::new(rules, config))
    }

    /// The compiled rule table.
    pub const fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Confidence below which an error is not sent to Claude.
    pub const fn min_confidence(&self) -> f32 {
        self.min_confidence
    }

    /// Classify raw error output; `language` overrides detection and `exit_code` feeds the memory and timeout fallbacks.
    pub fn classify(
        &self,
        error_message: &str,
        stderr: Option<&str>,
        exit_code: Option<i32>,
    ) -> ClassifiedError {
        self.classify_for(error_message, stderr, exit_code, Language::Unknown)
    }

    /// Like [`Self::classify`], with the project's language as a fallback
    /// for rules that do not name one.
    pub fn classify_for(
        &self,
        error_message: &str,
        stderr: Option<&str>,
        exit_code: Option<i32>,
        project_language: Language,
    ) -> ClassifiedError {
        let text = combine(error_message, stderr);

        let matched = self
            .rules
            .iter()
            .find_map(|rule| rule.regex().captures(&text).map(|caps| (rule, caps)));

        let classified = match matched {
            Some((rule, caps)) => self.classify_match(rule, &caps, &text, project_language),
            None => self.unmatched(&text, exit_code, project_language),
        };

        debug!(
            rule_id = classified.rule_id.as_deref().unwrap_or("-"),
            error_type = %classified.error_type,
            language = %classified.language,
            fixable = classified.is_claude_fixable,
            confidence = classified.confidence,
            "Classified error"
        );
        classified
    }

    /// Whether the error should be escalated to an LLM tier, and why.
    pub fn should_call_claude(&self, error: &ClassifiedError) -> (bool, String) {
        if !error.is_claude_fixable || error.category.is_operational() {
            return (
                false,
                format!(
                    "{} error needs manual action: {}",
                    error.error_type, error.suggested_action
                ),
            );
        }
        if error.confidence < self.min_confidence {
            return (
                false,
                format!(
                    "confidence {:.2} is below the {:.2} threshold",
                    error.confidence, self.min_confidence
                ),
            );
        }
        (
            true,
            format!(
                "{} error is fixable (confidence {:.2})",
                error.error_type, error.confidence
            ),
        )
    }

    fn classify_match(
        &self,
        rule: &Rule,
        caps: &Captures<'_>,
        text: &str,
        project_language: Language,
    ) -> ClassifiedError {
        let language = effective_language(rule.language, project_language);

        let mut context = rule.context.clone();
        for name in rule.regex().capture_names().flatten() {
            if let Some(m) = caps.name(name) {
                context.insert(name.to_string(), m.as_str().to_string());
            }
        }

        let captured = caps.name("file").map(|file| Location {
            file: file.as_str().to_string(),
            line: caps.name("line").and_then(|m| m.as_str().parse().ok()),
            column: caps.name("col").and_then(|m| m.as_str().parse().ok()),
            extra: BTreeMap::new(),
        });
        let (file_path, line_number) = self.locate(captured, text, &mut context);

        if rule.error_type.category() == ErrorCategory::Dependency {
            if let Some(package) = context
                .get("module")
                .and_then(|module| package::normalize_package(module, language))
            {
                context.insert("package".to_string(), package);
            }
            let command = match &rule.command {
                Some(template) => render(template, &context),
                None => context
                    .get("package")
                    .and_then(|p| package::install_command(p, language)),
            };
            if let Some(command) = command {
                context.insert("suggested_command".to_string(), command);
            }
        }

        let suggested_action = render(&rule.action, &context)
            .or_else(|| context.get("suggested_command").cloned())
            .unwrap_or_else(|| fallback_action(rule.error_type).to_string());

        ClassifiedError {
            error_type: rule.error_type,
            category: rule.error_type.category(),
            language,
            is_claude_fixable: rule.fixable,
            file_path,
            line_number,
            original_message: text.to_string(),
            suggested_action,
            confidence: rule.confidence,
            extracted_context: context,
            rule_id: Some(rule.id.clone()),
        }
    }

    fn unmatched(
        &self,
        text: &str,
        exit_code: Option<i32>,
        project_language: Language,
    ) -> ClassifiedError {
        let mut context = BTreeMap::new();
        if let Some(code) = exit_code {
            context.insert("exit_code".to_string(), code.to_string());
        }
        let (file_path, line_number) = self.locate(None, text, &mut context);

        let (error_type, fixable, confidence) = match exit_code {
            Some(137) => (ErrorType::Memory, false, 0.7),
            Some(124) => (ErrorType::Timeout, false, 0.7),
            _ => (ErrorType::Unknown, self.unknown_is_fixable, 0.5),
        };
        let suggested_action = match error_type {
            ErrorType::Unknown if fixable => "Send the error to Claude for analysis",
            other => fallback_action(other),
        };

        ClassifiedError {
            error_type,
            category: error_type.category(),
            language: project_language,
            is_claude_fixable: fixable,
            file_path,
            line_number,
            original_message: text.to_string(),
            suggested_action: suggested_action.to_string(),
            confidence,
            extracted_context: context,
            rule_id: None,
        }
    }

    /// Resolve file and line, preferring what the rule captured, then the
    /// Maven extractor, then the generic location patterns.
    fn locate(
        &self,
        captured: Option<Location>,
        text: &str,
        context: &mut BTreeMap<String, String>,
    ) -> (Option<String>, Option<u32>) {
        let mut location = captured;

        if text.contains(".java:[") {
            if let Some(maven) = extract_maven(text) {
                for (key, value) in &maven.extra {
                    context
                        .entry(key.clone())
                        .or_insert_with(|| value.clone());
                }
                location.get_or_insert(maven);
            }
        }
        if location.is_none() {
            location = find_location(text, self.rules.locations());
        }

        let Some(location) = location else {
            return (None, None);
        };
        let file = self.paths.normalize(&location.file);
        context.insert("file".to_string(), file.clone());
        if let Some(line) = location.line {
            context.insert("line".to_string(), line.to_string());
        }
        (Some(file), location.line)
    }
}

fn combine(message: &str, stderr: Option<&str>) -> String {
    match stderr.map(str::trim).filter(|s| !s.is_empty()) {
        Some(err) if !message.contains(err) => {
            if message.trim().is_empty() {
                err.to_string()
            } else {
                format!("{message}\n{err}")
            }
        }
        _ => message.to_string(),
    }
}

/// A JavaScript rule firing inside a TypeScript, Angular or Vue project
/// reports the project's flavour.
fn effective_language(rule: Option<Language>, project: Language) -> Language {
    match rule {
        Some(lang) if lang.is_node() && project.is_node() => project,
        Some(lang) => lang,
        None => project,
    }
}

/// Expand `${name}` placeholders; `None` if any placeholder has no value.
fn render(template: &str, context: &BTreeMap<String, String>) -> Option<String> {
    let mut complete = true;
    let rendered = TEMPLATE_VAR.replace_all(template, |caps: &Captures<'_>| {
        context.get(&caps[1]).cloned().unwrap_or_else(|| {
            complete = false;
            String::new()
        })
    });
    complete.then(|| rendered.into_owned())
}

const fn fallback_action(error_type: ErrorType) -> &'static str {
    match error_type {
        ErrorType::PortConflict => "Stop the process holding the port or configure a different port",
        ErrorType::Infrastructure => "Install the missing tool or start the required service",
        ErrorType::Network => "Check network connectivity and retry",
        ErrorType::Permission => "Fix file ownership or permissions",
        ErrorType::Memory => "The process ran out of memory; give it more memory",
        ErrorType::Timeout => "The command timed out; increase the timeout or investigate the hang",
        ErrorType::MissingDependency => "Install the missing dependency",
        ErrorType::DependencyConflict => "Resolve the conflicting dependency versions",
        ErrorType::MissingFile => "Create the missing file or fix the path",
        ErrorType::Config => "Fix the project configuration",
        ErrorType::Unknown => "Inspect the error output manually",
        _ => "Fix the reported error",
    }
}
