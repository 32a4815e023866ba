//! Project context handed to fix strategies.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::classified_error::Language;

/// A project file included in a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextFile {
    /// Project-relative path with forward slashes.
    pub path: String,
    /// File text, possibly cut.
    pub content: String,
    /// Content was cut to fit the byte budget.
    pub truncated: bool,
}

/// A module an error reports as missing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MissingModule {
    /// Module specifier as written in the error.
    pub name: String,
    /// `./x`, `../x` or an absolute path rather than a package name.
    pub relative: bool,
}

/// Everything a strategy may look at besides the classified error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixContext {
    /// Absolute project root.
    pub project_root: PathBuf,
    /// Detected project language.
    pub language: Language,
    /// The lines around the error as they appeared in the command output.
    pub error_window: String,
    /// The file the error points at.
    pub primary_file: Option<ContextFile>,
    /// Imports and importers of the primary file, plus files that look like
    /// the target of a missing relative import.
    pub related_files: Vec<ContextFile>,
    /// Modules the error reports as missing.
    pub missing_modules: Vec<MissingModule>,
    /// Project file listing, capped.
    pub project_files: Vec<String>,
}

impl FixContext {
    /// Context holding only the error window.
    pub fn new(project_root: impl Into<PathBuf>, language: Language, error_window: &str) -> Self {
        Self {
            project_root: project_root.into(),
            language,
            error_window: error_window.to_string(),
            ..Self::default()
        }
    }

    /// Primary file first, then related files.
    pub fn files(&self) -> impl Iterator<Item = &ContextFile> {
        self.primary_file.iter().chain(self.related_files.iter())
    }

    /// Bytes of file content across all included files.
    pub fn total_bytes(&self) -> usize {
        self.files().map(|f| f.content.len()).sum()
    }
}
