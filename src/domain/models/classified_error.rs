//! Classified error model.
//!
//! A [`ClassifiedError`] is the structured output of the rule-based error
//! classifier. It is created fresh for every error occurrence and consumed
//! by the fix-tier dispatcher; nothing mutates it after classification.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// ErrorType
// ---------------------------------------------------------------------------

/// Fine-grained kind of a classified error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// Parse errors, unexpected tokens, bad indentation.
    Syntax,
    /// Unresolvable imports of project-local modules.
    Import,
    /// Type mismatches and missing members.
    Type,
    /// Undefined names, symbols or variables.
    Reference,
    /// A third-party package is not installed.
    MissingDependency,
    /// Conflicting peer or version requirements.
    DependencyConflict,
    /// A referenced source or asset file does not exist.
    MissingFile,
    /// Missing or invalid project configuration files.
    Config,
    /// Generic compiler failures not covered by a narrower kind.
    Compilation,
    /// Exceptions raised while the program runs.
    Runtime,
    /// Missing binaries, daemons or toolchains.
    Infrastructure,
    /// Connection failures, DNS errors and network timeouts.
    Network,
    /// A port is already bound by another process.
    PortConflict,
    /// Filesystem or process permission denied.
    Permission,
    /// Out-of-memory conditions.
    Memory,
    /// A command exceeded its time budget.
    Timeout,
    /// Nothing in the rule table matched.
    Unknown,
}

impl ErrorType {
    /// All variants, in declaration order.
    pub const ALL: [Self; 17] = [
        Self::Syntax,
        Self::Import,
        Self::Type,
        Self::Reference,
        Self::MissingDependency,
        Self::DependencyConflict,
        Self::MissingFile,
        Self::Config,
        Self::Compilation,
        Self::Runtime,
        Self::Infrastructure,
        Self::Network,
        Self::PortConflict,
        Self::Permission,
        Self::Memory,
        Self::Timeout,
        Self::Unknown,
    ];

    /// Routing category for this error type.
    pub const fn category(self) -> ErrorCategory {
        match self {
            Self::Syntax => ErrorCategory::Syntax,
            Self::Import => ErrorCategory::Import,
            Self::Type => ErrorCategory::Type,
            Self::Reference | Self::Compilation | Self::Runtime => ErrorCategory::Code,
            Self::MissingDependency | Self::DependencyConflict => ErrorCategory::Dependency,
            Self::MissingFile => ErrorCategory::MissingFile,
            Self::Config => ErrorCategory::Config,
            Self::Infrastructure => ErrorCategory::Infra,
            Self::Network => ErrorCategory::Network,
            Self::PortConflict => ErrorCategory::Port,
            Self::Permission => ErrorCategory::Permission,
            Self::Memory => ErrorCategory::Memory,
            Self::Timeout => ErrorCategory::Timeout,
            Self::Unknown => ErrorCategory::Unknown,
        }
    }

    /// Stable snake_case name, matching the serde representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Syntax => "syntax",
            Self::Import => "import",
            Self::Type => "type",
            Self::Reference => "reference",
            Self::MissingDependency => "missing_dependency",
            Self::DependencyConflict => "dependency_conflict",
            Self::MissingFile => "missing_file",
            Self::Config => "config",
            Self::Compilation => "compilation",
            Self::Runtime => "runtime",
            Self::Infrastructure => "infrastructure",
            Self::Network => "network",
            Self::PortConflict => "port_conflict",
            Self::Permission => "permission",
            Self::Memory => "memory",
            Self::Timeout => "timeout",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ErrorCategory
// ---------------------------------------------------------------------------

/// Coarse taxonomy used to route errors to fix tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed source.
    Syntax,
    /// Unresolvable local import.
    Import,
    /// Type checker errors.
    Type,
    /// Other compiler or runtime errors in project code.
    Code,
    /// Missing or conflicting packages.
    Dependency,
    /// Broken or missing project configuration.
    Config,
    /// A file the program expects is absent.
    MissingFile,
    /// Missing tools or services on the host.
    Infra,
    /// Connectivity problems.
    Network,
    /// Port already taken.
    Port,
    /// Filesystem permissions.
    Permission,
    /// Out of memory.
    Memory,
    /// The command ran too long.
    Timeout,
    /// Nothing recognised the error.
    Unknown,
}

impl ErrorCategory {
    /// Categories that require operator intervention and are never sent to an LLM.
    pub const fn is_operational(self) -> bool {
        matches!(
            self,
            Self::Infra | Self::Network | Self::Port | Self::Permission | Self::Memory | Self::Timeout
        )
    }

    /// Categories that can usually be repaired by editing a single file.
    pub const fn is_single_file(self) -> bool {
        matches!(self, Self::Syntax | Self::Import | Self::Type | Self::Code)
    }

    /// Wire name, matching the serde representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Syntax => "syntax",
            Self::Import => "import",
            Self::Type => "type",
            Self::Code => "code",
            Self::Dependency => "dependency",
            Self::Config => "config",
            Self::MissingFile => "missing_file",
            Self::Infra => "infra",
            Self::Network => "network",
            Self::Port => "port",
            Self::Permission => "permission",
            Self::Memory => "memory",
            Self::Timeout => "timeout",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Language
// ---------------------------------------------------------------------------

/// Source language or framework an error (or project) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Node.js or browser JavaScript.
    JavaScript,
    /// TypeScript.
    TypeScript,
    /// Python.
    Python,
    /// Java (Maven or Gradle).
    Java,
    /// Go.
    Go,
    /// Rust.
    Rust,
    /// C.
    C,
    /// C++.
    Cpp,
    /// C# / .NET.
    CSharp,
    /// PHP.
    Php,
    /// Ruby.
    Ruby,
    /// Dart and Flutter.
    Dart,
    /// Solidity (Hardhat or Foundry).
    Solidity,
    /// Angular workspace.
    Angular,
    /// Vue project.
    Vue,
    /// Not detected.
    #[default]
    Unknown,
}

impl Language {
    /// Whether this language shares the Node.js package ecosystem.
    pub const fn is_node(self) -> bool {
        matches!(
            self,
            Self::JavaScript | Self::TypeScript | Self::Angular | Self::Vue
        )
    }

    /// Install command prefix for a single package, if the ecosystem has one.
    pub const fn install_prefix(self) -> Option<&'static str> {
        match self {
            Self::JavaScript | Self::TypeScript | Self::Angular | Self::Vue => Some("npm install"),
            Self::Python => Some("pip install"),
            Self::Go => Some("go get"),
            Self::Rust => Some("cargo add"),
            Self::Php => Some("composer require"),
            Self::Ruby => Some("gem install"),
            Self::Dart => Some("dart pub add"),
            Self::CSharp => Some("dotnet add package"),
            Self::Solidity => Some("npm install"),
            Self::Java | Self::C | Self::Cpp | Self::Unknown => None,
        }
    }

    /// Lowercase name used in rules and config.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Python => "python",
            Self::Java => "java",
            Self::Go => "go",
            Self::Rust => "rust",
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::CSharp => "csharp",
            Self::Php => "php",
            Self::Ruby => "ruby",
            Self::Dart => "dart",
            Self::Solidity => "solidity",
            Self::Angular => "angular",
            Self::Vue => "vue",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ClassifiedError
// ---------------------------------------------------------------------------

/// Structured classification of one raw error occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedError {
    /// Fine-grained error kind.
    pub error_type: ErrorType,
    /// Routing category derived from `error_type`.
    pub category: ErrorCategory,
    /// Language of the rule that matched, if the rule names one.
    pub language: Language,
    /// Whether an LLM (or pattern fix) is believed able to repair this error.
    pub is_claude_fixable: bool,
    /// Project-relative path of the offending file, when one was found.
    pub file_path: Option<String>,
    /// 1-based line number inside `file_path`.
    pub line_number: Option<u32>,
    /// The raw text that was classified.
    pub original_message: String,
    /// Human-readable next step (an install command, a manual action, ...).
    pub suggested_action: String,
    /// Classifier confidence in `[0, 1]`.
    pub confidence: f32,
    /// Named regex captures and derived facts (`module`, `package`, `port`, ...).
    pub extracted_context: BTreeMap<String, String>,
    /// Identifier of the matching rule; `None` for unmatched errors.
    pub rule_id: Option<String>,
}

impl ClassifiedError {
    /// Convenience lookup into `extracted_context`.
    pub fn context(&self, key: &str) -> Option<&str> {
        self.extracted_context.get(key).map(String::as_str)
    }

    /// Install command recorded by dependency rules.
    pub fn suggested_command(&self) -> Option<&str> {
        self.context("suggested_command")
    }

    /// Short single-line summary for logs and tables.
    pub fn summary(&self) -> String {
        let location = match (&self.file_path, self.line_number) {
            (Some(file), Some(line)) => format!(" at {file}:{line}"),
            (Some(file), None) => format!(" in {file}"),
            _ => String::new(),
        };
        format!(
            "{} ({:.0}%){}",
            self.error_type,
            self.confidence * 100.0,
            location
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_type_has_a_category() {
        for ty in ErrorType::ALL {
            let category = ty.category();
            assert!(!category.as_str().is_empty());
        }
        assert_eq!(ErrorType::Reference.category(), ErrorCategory::Code);
        assert_eq!(
            ErrorType::DependencyConflict.category(),
            ErrorCategory::Dependency
        );
        assert_eq!(ErrorType::PortConflict.category(), ErrorCategory::Port);
    }

    #[test]
    fn operational_categories() {
        assert!(ErrorCategory::Infra.is_operational());
        assert!(ErrorCategory::Port.is_operational());
        assert!(ErrorCategory::Memory.is_operational());
        assert!(!ErrorCategory::Syntax.is_operational());
        assert!(!ErrorCategory::Unknown.is_operational());
    }

    #[test]
    fn error_type_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorType::MissingDependency).unwrap();
        assert_eq!(json, "\"missing_dependency\"");
        let back: ErrorType = serde_json::from_str("\"port_conflict\"").unwrap();
        assert_eq!(back, ErrorType::PortConflict);
    }

    #[test]
    fn install_prefixes() {
        assert_eq!(Language::Vue.install_prefix(), Some("npm install"));
        assert_eq!(Language::Python.install_prefix(), Some("pip install"));
        assert_eq!(Language::Java.install_prefix(), None);
    }
}
