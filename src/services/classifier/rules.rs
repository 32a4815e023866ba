//! Data-driven rule table for the error classifier.
//!
//! Rules live in YAML. The built-in table is embedded at compile time and a
//! project may supply its own file whose rules are tried before the
//! built-ins of the same list.

use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::models::{ErrorType, Language};

const BUILTIN_RULES: &str = include_str!("../../../rules/default_rules.yaml");

/// Errors raised while loading a rule table.
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// The rules file could not be read.
    #[error("Failed to read rules file {path}: {source}")]
    Io {
        /// Rules file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The YAML did not match the rule schema.
    #[error("Failed to parse rules from {origin}: {source}")]
    Parse {
        /// File path, or `builtin`.
        origin: String,
        /// Underlying error.
        #[source]
        source: serde_yaml::Error,
    },

    /// A rule's regex did not compile.
    #[error("Rule '{id}' has an invalid pattern: {source}")]
    InvalidPattern {
        /// Offending rule.
        id: String,
        /// Underlying error.
        #[source]
        source: regex::Error,
    },

    /// A rule failed validation.
    #[error("Rule '{id}' is invalid: {reason}")]
    InvalidRule {
        /// Offending rule.
        id: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Two rules share an id.
    #[error("Duplicate rule id '{0}'")]
    DuplicateId(String),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleDef {
    id: String,
    #[serde(rename = "type")]
    error_type: ErrorType,
    #[serde(default)]
    language: Option<Language>,
    #[serde(default = "default_confidence")]
    confidence: f32,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    context: BTreeMap<String, String>,
    #[serde(default)]
    example: Option<String>,
    pattern: String,
}

const fn default_confidence() -> f32 {
    0.8
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LocationDef {
    id: String,
    #[serde(default)]
    last: bool,
    pattern: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleFile {
    #[serde(default)]
    non_fixable: Vec<RuleDef>,
    #[serde(default)]
    fixable: Vec<RuleDef>,
    #[serde(default)]
    locations: Vec<LocationDef>,
}

/// One compiled classification rule.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Unique rule id
    pub id: String,
    /// Error type assigned on match
    pub error_type: ErrorType,
    /// Language assigned on match, if the rule is language specific
    pub language: Option<Language>,
    /// Base confidence in `0.0..=1.0`
    pub confidence: f32,
    /// Template for `suggested_action`; `${name}` expands from the context.
    pub action: String,
    /// Template for the Tier 1 shell command, when it differs from the
    /// default install command.
    pub command: Option<String>,
    /// Static facts added to `extracted_context` on match.
    pub context: BTreeMap<String, String>,
    /// Sample output this rule should win against every earlier rule.
    pub example: Option<String>,
    /// Whether the rule came from the `fixable` list
    pub fixable: bool,
    regex: Regex,
}

impl Rule {
    /// Source text of the compiled pattern.
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    pub(crate) const fn regex(&self) -> &Regex {
        &self.regex
    }
}

/// A compiled file/line extraction pattern.
#[derive(Debug, Clone)]
pub struct LocationRule {
    /// Unique rule id
    pub id: String,
    /// Prefer the last match (Python tracebacks list the failing frame last).
    pub last: bool,
    regex: Regex,
}

impl LocationRule {
    pub(crate) const fn regex(&self) -> &Regex {
        &self.regex
    }
}

/// Ordered rule lists used by [`super::ErrorClassifier`].
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    non_fixable: Vec<Rule>,
    fixable: Vec<Rule>,
    locations: Vec<LocationRule>,
}

impl RuleSet {
    /// The embedded default table.
    pub fn builtin() -> Result<Self, ClassifierError> {
        Self::from_yaml(BUILTIN_RULES, "built-in rules")
    }

    /// Load a rule table from a YAML file on disk.
    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        let text = std::fs::read_to_string(path).map_err(|source| ClassifierError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text, &path.display().to_string())
    }

    /// Parse and compile a rule table.
    pub fn from_yaml(text: &str, origin: &str) -> Result<Self, ClassifierError> {
        let file: RuleFile = serde_yaml::from_str(text).map_err(|source| ClassifierError::Parse {
            origin: origin.to_string(),
            source,
        })?;

        let mut seen = HashSet::new();
        let mut compile_list = |defs: Vec<RuleDef>, fixable: bool| {
            defs.into_iter()
                .map(|def| {
                    if !seen.insert(def.id.clone()) {
                        return Err(ClassifierError::DuplicateId(def.id));
                    }
                    compile_rule(def, fixable)
                })
                .collect::<Result<Vec<_>, _>>()
        };

        let non_fixable = compile_list(file.non_fixable, false)?;
        let fixable = compile_list(file.fixable, true)?;
        let locations = file
            .locations
            .into_iter()
            .map(compile_location)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            non_fixable,
            fixable,
            locations,
        })
    }

    /// Put `overrides` in front of the rules of each list.
    ///
    /// A built-in rule whose id is redefined by the override is dropped.
    #[must_use]
    pub fn with_overrides(self, overrides: Self) -> Self {
        let ids: HashSet<String> = overrides.iter().map(|r| r.id.clone()).collect();
        let location_ids: HashSet<String> =
            overrides.locations.iter().map(|l| l.id.clone()).collect();

        let merge = |mut first: Vec<Rule>, rest: Vec<Rule>| {
            first.extend(rest.into_iter().filter(|r| !ids.contains(&r.id)));
            first
        };

        let mut locations = overrides.locations;
        locations.extend(
            self.locations
                .into_iter()
                .filter(|l| !location_ids.contains(&l.id)),
        );

        Self {
            non_fixable: merge(overrides.non_fixable, self.non_fixable),
            fixable: merge(overrides.fixable, self.fixable),
            locations,
        }
    }

    /// Rules for errors that need manual intervention, checked first.
    pub fn non_fixable(&self) -> &[Rule] {
        &self.non_fixable
    }

    /// Rules for errors the fixer may attempt.
    pub fn fixable(&self) -> &[Rule] {
        &self.fixable
    }

    /// File/line extraction rules.
    pub fn locations(&self) -> &[LocationRule] {
        &self.locations
    }

    /// All rules in evaluation order.
    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.non_fixable.iter().chain(self.fixable.iter())
    }

    /// Number of classification rules.
    pub fn len(&self) -> usize {
        self.non_fixable.len() + self.fixable.len()
    }

    /// True when the table has no classification rules.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn compile_rule(def: RuleDef, fixable: bool) -> Result<Rule, ClassifierError> {
    if def.id.trim().is_empty() {
        return Err(ClassifierError::InvalidRule {
            id: def.id,
            reason: "id must not be empty".to_string(),
        });
    }
    if !(0.0..=1.0).contains(&def.confidence) {
        return Err(ClassifierError::InvalidRule {
            reason: format!("confidence {} is outside [0, 1]", def.confidence),
            id: def.id,
        });
    }

    let regex = Regex::new(&def.pattern).map_err(|source| ClassifierError::InvalidPattern {
        id: def.id.clone(),
        source,
    })?;

    let action = def.action.unwrap_or_else(|| {
        if fixable {
            format!("Fix the {} error", def.error_type)
        } else {
            "Manual intervention required".to_string()
        }
    });

    Ok(Rule {
        id: def.id,
        error_type: def.error_type,
        language: def.language,
        confidence: def.confidence,
        action,
        command: def.command,
        context: def.context,
        example: def.example,
        fixable,
        regex,
    })
}

fn compile_location(def: LocationDef) -> Result<LocationRule, ClassifierError> {
    let regex = Regex::new(&def.pattern).map_err(|source| ClassifierError::InvalidPattern {
        id: def.id.clone(),
        source,
    })?;
    if !regex.capture_names().flatten().any(|name| name == "file") {
        return Err(ClassifierError::InvalidRule {
            id: def.id,
            reason: "location patterns need a named `file` group".to_string(),
        });
    }
    Ok(LocationRule {
        id: def.id,
        last: def.last,
        regex,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_compiles() {
        let rules = RuleSet::builtin().expect("built-in rules must load");
        assert!(rules.fixable().len() > 80, "got {}", rules.fixable().len());
        assert!(!rules.non_fixable().is_empty());
        assert!(!rules.locations().is_empty());
        assert!(rules.non_fixable().iter().all(|r| !r.fixable));
        assert!(rules.fixable().iter().all(|r| r.fixable));
    }

    #[test]
    fn builtin_rules_all_carry_a_matching_example() {
        let rules = RuleSet::builtin().unwrap();
        for rule in rules.iter() {
            let example = rule
                .example
                .as_deref()
                .unwrap_or_else(|| panic!("rule {} has no example", rule.id));
            assert!(rule.regex().is_match(example), "{} does not match its example", rule.id);
        }
    }

    #[test]
    fn builtin_table_covers_every_language() {
        let rules = RuleSet::builtin().unwrap();
        let languages: HashSet<Language> = rules.iter().filter_map(|r| r.language).collect();
        for lang in [
            Language::JavaScript,
            Language::TypeScript,
            Language::Python,
            Language::Java,
            Language::Go,
            Language::Rust,
            Language::C,
            Language::Cpp,
            Language::CSharp,
            Language::Php,
            Language::Ruby,
            Language::Dart,
            Language::Solidity,
            Language::Angular,
            Language::Vue,
        ] {
            assert!(languages.contains(&lang), "no rule for {lang}");
        }
    }

    #[test]
    fn rejects_bad_patterns() {
        let yaml = r"
fixable:
  - id: broken
    type: syntax
    pattern: '(unclosed'
";
        let err = RuleSet::from_yaml(yaml, "test").unwrap_err();
        assert!(matches!(err, ClassifierError::InvalidPattern { ref id, .. } if id == "broken"));
    }

    #[test]
    fn rejects_duplicate_ids_across_lists() {
        let yaml = r"
non_fixable:
  - id: same
    type: network
    pattern: 'a'
fixable:
  - id: same
    type: syntax
    pattern: 'b'
";
        let err = RuleSet::from_yaml(yaml, "test").unwrap_err();
        assert!(matches!(err, ClassifierError::DuplicateId(ref id) if id == "same"));
    }

    #[test]
    fn rejects_out_of_range_confidence() {
        let yaml = r"
fixable:
  - id: overconfident
    type: syntax
    confidence: 1.5
    pattern: 'x'
";
        assert!(matches!(
            RuleSet::from_yaml(yaml, "test"),
            Err(ClassifierError::InvalidRule { .. })
        ));
    }

    #[test]
    fn location_rules_need_a_file_group() {
        let yaml = r"
locations:
  - id: no-file
    pattern: 'line (\d+)'
";
        assert!(matches!(
            RuleSet::from_yaml(yaml, "test"),
            Err(ClassifierError::InvalidRule { .. })
        ));
    }

    #[test]
    fn overrides_go_first_and_replace_same_ids() {
        let base = RuleSet::builtin().unwrap();
        let base_len = base.fixable().len();
        let yaml = r"
fixable:
  - id: custom-widget
    type: reference
    confidence: 0.99
    pattern: 'WidgetError'
  - id: js-missing-package
    type: missing_dependency
    language: javascript
    pattern: 'Cannot find module (?P<module>\w+)'
";
        let overrides = RuleSet::from_yaml(yaml, "test").unwrap();
        let merged = base.with_overrides(overrides);

        assert_eq!(merged.fixable()[0].id, "custom-widget");
        assert_eq!(merged.fixable()[1].id, "js-missing-package");
        assert_eq!(merged.fixable().len(), base_len + 1);
        assert_eq!(
            merged
                .fixable()
                .iter()
                .filter(|r| r.id == "js-missing-package")
                .count(),
            1
        );
    }

    #[test]
    fn missing_action_gets_a_default() {
        let yaml = r"
non_fixable:
  - id: vpn
    type: network
    pattern: 'VPN down'
";
        let rules = RuleSet::from_yaml(yaml, "test").unwrap();
        assert_eq!(rules.non_fixable()[0].action, "Manual intervention required");
        assert!((rules.non_fixable()[0].confidence - 0.8).abs() < f32::EPSILON);
    }
}
