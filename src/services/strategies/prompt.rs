//! Prompt text for the LLM tiers.

use std::fmt::Write as _;

use crate::domain::models::{ClassifiedError, ContextFile, FixContext};
use crate::services::secret_scrubber::SecretScrubber;

pub const HAIKU_SYSTEM: &str = "You fix a single error in a single source file. \
Answer with JSON only, no prose: \
{\"fixes\": [{\"search\": \"exact text from the file\", \"replace\": \"replacement text\"}], \
\"explanation\": \"one sentence\"}. \
Each search string must appear verbatim in the file and should be short but unique. \
Do not rewrite unrelated code.";

pub const SONNET_SYSTEM: &str = "You fix build and runtime errors in software projects. \
Answer with JSON only: \
{\"files\": [{\"path\": \"project/relative/path\", \"action\": \"create|replace|edit\", \
\"content\": \"full file for create/replace\", \
\"search\": \"exact text for edit\", \"replace\": \"replacement for edit\"}], \
\"explanation\": \"one sentence\"}. \
For create and replace, send the complete file with no placeholders or TODO markers. \
You may instead answer with <file path=\"...\">full content</file> blocks or a unified diff \
inside <patch></patch>.";

fn describe_error(out: &mut String, error: &ClassifiedError, context: &FixContext) {
    let _ = writeln!(out, "Error type: {} ({})", error.error_type, error.category);
    let _ = writeln!(out, "Language: {}", context.language);
    if let Some(file) = &error.file_path {
        match error.line_number {
            Some(line) => {
                let _ = writeln!(out, "Location: {file}:{line}");
            }
            None => {
                let _ = writeln!(out, "File: {file}");
            }
        }
    }
    for (key, value) in &error.extracted_context {
        if !matches!(key.as_str(), "file" | "line" | "suggested_command") {
            let _ = writeln!(out, "{key}: {value}");
        }
    }
    let _ = writeln!(out, "\nError message:\n{}", error.original_message.trim());
    let window = context.error_window.trim();
    if !window.is_empty() && window != error.original_message.trim() {
        let _ = writeln!(out, "\nSurrounding output:\n{window}");
    }
}

fn push_file(out: &mut String, file: &ContextFile) {
    let marker = if file.truncated { " (truncated)" } else { "" };
    let _ = writeln!(out, "\n--- {}{marker} ---\n{}", file.path, file.content);
}

/// Single-file prompt: the error plus the full text of the file to edit.
pub fn haiku_prompt(
    scrubber: &SecretScrubber,
    error: &ClassifiedError,
    context: &FixContext,
    path: &str,
    content: &str,
) -> String {
    let mut out = String::new();
    describe_error(&mut out, error, context);
    let _ = writeln!(out, "\nFile to fix: {path}\n```\n{content}\n```");
    scrubber.scrub(&out)
}

/// Multi-file prompt: the error, the context files and the project listing.
pub fn sonnet_prompt(scrubber: &SecretScrubber, error: &ClassifiedError, context: &FixContext) -> String {
    let mut out = String::new();
    describe_error(&mut out, error, context);

    if !context.missing_modules.is_empty() {
        let names: Vec<&str> = context.missing_modules.iter().map(|m| m.name.as_str()).collect();
        let _ = writeln!(out, "\nMissing modules: {}", names.join(", "));
    }
    if context.files().next().is_some() {
        out.push_str("\nRelevant files:\n");
        for file in context.files() {
            push_file(&mut out, file);
        }
    }
    if !context.project_files.is_empty() {
        let _ = writeln!(out, "\nProject files:\n{}", context.project_files.join("\n"));
    }
    scrubber.scrub(&out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ErrorType, Language, MissingModule};
    use std::collections::BTreeMap;

    fn error() -> ClassifiedError {
        ClassifiedError {
            error_type: ErrorType::Import,
            category: ErrorType::Import.category(),
            language: Language::TypeScript,
            is_claude_fixable: true,
            file_path: Some("src/app.ts".into()),
            line_number: Some(3),
            original_message: "Cannot find module './utils' (key sk-ant-REDACTED)".into(),
            suggested_action: String::new(),
            confidence: 0.9,
            extracted_context: BTreeMap::from([("module".to_string(), "./utils".to_string())]),
            rule_id: Some("ts-relative-import".into()),
        }
    }

    #[test]
    fn prompts_are_scrubbed() {
        let context = FixContext::new("/p", Language::TypeScript, "");
        let prompt = haiku_prompt(&SecretScrubber::new(), &error(), &context, "src/app.ts", "x");
        assert!(!prompt.contains("sk-ant-api03"));
        assert!(prompt.contains("Location: src/app.ts:3"));
        assert!(prompt.contains("module: ./utils"));
    }

    #[test]
    fn sonnet_prompt_lists_context() {
        let mut context = FixContext::new("/p", Language::TypeScript, "");
        context.primary_file = Some(ContextFile {
            path: "src/app.ts".into(),
            content: "import { a } from './utils';".into(),
            truncated: false,
        });
        context.missing_modules.push(MissingModule {
            name: "./utils".into(),
            relative: true,
        });
        context.project_files = vec!["src/app.ts".into(), "src/util.ts".into()];

        let prompt = sonnet_prompt(&SecretScrubber::new(), &error(), &context);
        assert!(prompt.contains("--- src/app.ts ---"));
        assert!(prompt.contains("Missing modules: ./utils"));
        assert!(prompt.contains("src/util.ts"));
    }
}
