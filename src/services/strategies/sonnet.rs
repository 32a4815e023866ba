//! Tier 3: multi-file fixes from the expensive model.
//!
//! Every change in the answer is applied independently. The fix counts as a
//! success when at least one file was written; changes that fail (a partial
//! file, a patch that does not apply) are logged and skipped.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use super::prompt::{sonnet_prompt, SONNET_SYSTEM};
use super::response_parser::{
    apply_patch, apply_search_replace, is_complete_file, parse_file_changes, FileChange,
};
use super::{elapsed_ms, FixStrategy};
use crate::domain::models::{ClassifiedError, FixContext, FixResult, FixTier, FixType};
use crate::domain::ports::{CompletionRequest, LlmClient, ModelAlias, ProjectFiles, ProjectFilesFactory};
use crate::services::cost_tracker::completion_cost;
use crate::services::secret_scrubber::SecretScrubber;

const MAX_TOKENS: u32 = 8_192;

/// Tier 3: multi-file fixes from the expensive model.
pub struct SonnetStrategy {
    llm: Arc<dyn LlmClient>,
    files: ProjectFilesFactory,
    scrubber: SecretScrubber,
}

/// What applying one change did.
enum Applied {
    Created,
    Modified,
}

impl SonnetStrategy {
    /// Strategy over `llm`, editing files through `files`.
    pub fn new(llm: Arc<dyn LlmClient>, files: ProjectFilesFactory) -> Self {
        Self {
            llm,
            files,
            scrubber: SecretScrubber::new(),
        }
    }

    async fn apply(files: &dyn ProjectFiles, change: &FileChange) -> Result<Applied, String> {
        match change {
            FileChange::Write { path, content } => {
                if !is_complete_file(content) {
                    return Err(format!("{path}: refusing to write an incomplete file"));
                }
                let existed = files.exists(path).await;
                files.write(path, content).await.map_err(|e| e.to_string())?;
                Ok(if existed { Applied::Modified } else { Applied::Created })
            }
            FileChange::Edit { path, edits } => {
                let original = files.read(path).await.map_err(|e| e.to_string())?;
                let updated =
                    apply_search_replace(&original, edits).map_err(|e| format!("{path}: {e}"))?;
                files.write(path, &updated).await.map_err(|e| e.to_string())?;
                Ok(Applied::Modified)
            }
            FileChange::Patch { path, diff } => {
                let original = files.read(path).await.unwrap_or_default();
                let updated = apply_patch(&original, diff).map_err(|e| format!("{path}: {e}"))?;
                let existed = files.exists(path).await;
                files.write(path, &updated).await.map_err(|e| e.to_string())?;
                Ok(if existed { Applied::Modified } else { Applied::Created })
            }
        }
    }
}

#[async_trait]
impl FixStrategy for SonnetStrategy {
    fn name(&self) -> &'static str {
        "sonnet"
    }

    fn tier(&self) -> FixTier {
        FixTier::Sonnet
    }

    fn can_handle(&self, error: &ClassifiedError) -> bool {
        error.is_claude_fixable && !error.category.is_operational()
    }

    async fn fix(&self, error: &ClassifiedError, context: &FixContext) -> FixResult {
        let started = Instant::now();
        let request = CompletionRequest {
            model: ModelAlias::Sonnet,
            system: SONNET_SYSTEM.to_string(),
            prompt: sonnet_prompt(&self.scrubber, error, context),
            max_tokens: MAX_TOKENS,
            temperature: 0.0,
        };
        let completion = match self.llm.complete(request).await {
            Ok(completion) => completion,
            Err(e) => {
                warn!(error = %e, "Sonnet request failed");
                return FixResult::failure(FixTier::Sonnet, e.to_string()).with_time(elapsed_ms(started));
            }
        };
        let cost = completion_cost(&completion, FixTier::Sonnet);

        let changes = parse_file_changes(&completion.text);
        if changes.is_empty() {
            return FixResult::failure(FixTier::Sonnet, "response contains no file changes")
                .with_cost(cost)
                .with_time(elapsed_ms(started));
        }

        let files = (self.files)(&context.project_root);
        let mut written: Vec<PathBuf> = Vec::new();
        let mut created_any = false;
        let mut problems = Vec::new();
        for change in &changes {
            match Self::apply(files.as_ref(), change).await {
                Ok(applied) => {
                    created_any |= matches!(applied, Applied::Created);
                    written.push(change.path().into());
                }
                Err(problem) => {
                    warn!(path = %change.path(), problem = %problem, "Skipped file change");
                    problems.push(problem);
                }
            }
        }

        if written.is_empty() {
            return FixResult::failure(FixTier::Sonnet, problems.join("; "))
                .with_cost(cost)
                .with_time(elapsed_ms(started));
        }

        info!(files = written.len(), skipped = problems.len(), cost, "Sonnet fix applied");
        let fix_type = if created_any { FixType::FileCreate } else { FixType::FileEdit };
        FixResult::success(FixTier::Sonnet, fix_type)
            .with_files(written)
            .with_cost(cost)
            .with_time(elapsed_ms(started))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ErrorType, Language};
    use crate::domain::ports::{Completion, LlmError};
    use crate::infrastructure::files::FsProjectFiles;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    struct CannedLlm(String);

    #[async_trait]
    impl LlmClient for CannedLlm {
        async fn complete(&self, _request: CompletionRequest) -> Result<Completion, LlmError> {
            Ok(Completion {
                text: self.0.clone(),
                model: "claude-sonnet-4-5".into(),
                input_tokens: 2_000,
                output_tokens: 500,
            })
        }
    }

    fn import_error() -> ClassifiedError {
        ClassifiedError {
            error_type: ErrorType::Import,
            category: ErrorType::Import.category(),
            language: Language::JavaScript,
            is_claude_fixable: true,
            file_path: Some("src/index.js".into()),
            line_number: None,
            original_message: "Error: Cannot find module './utils'".into(),
            suggested_action: String::new(),
            confidence: 0.9,
            extracted_context: BTreeMap::new(),
            rule_id: None,
        }
    }

    fn strategy(answer: &str) -> SonnetStrategy {
        SonnetStrategy::new(Arc::new(CannedLlm(answer.to_string())), FsProjectFiles::factory())
    }

    #[tokio::test]
    async fn creates_files_from_json() {
        let dir = TempDir::new().unwrap();
        let answer = r#"{"files":[{"path":"src/utils.js","action":"create","content":"module.exports = { add: (a, b) => a + b };\n"}]}"#;

        let result = strategy(answer)
            .fix(&import_error(), &FixContext::new(dir.path(), Language::JavaScript, ""))
            .await;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.fix_type, FixType::FileCreate);
        assert_eq!(result.files_modified, vec![PathBuf::from("src/utils.js")]);
        assert!(dir.path().join("src/utils.js").exists());
    }

    #[tokio::test]
    async fn refuses_incomplete_files() {
        let dir = TempDir::new().unwrap();
        let answer = "<file path=\"src/utils.js\">\nfunction add(a, b) {\n  // TODO\n</file>";

        let result = strategy(answer)
            .fix(&import_error(), &FixContext::new(dir.path(), Language::JavaScript, ""))
            .await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("incomplete"));
        assert!(!dir.path().join("src/utils.js").exists());
    }

    #[tokio::test]
    async fn edits_existing_files() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/index.js"), "const u = require('./utils');\n").unwrap();
        let answer = r#"{"files":[{"path":"src/index.js","action":"edit","search":"./utils","replace":"./util"}]}"#;

        let result = strategy(answer)
            .fix(&import_error(), &FixContext::new(dir.path(), Language::JavaScript, ""))
            .await;

        assert!(result.success);
        assert_eq!(result.fix_type, FixType::FileEdit);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("src/index.js")).unwrap(),
            "const u = require('./util');\n"
        );
    }

    #[test]
    fn operational_errors_are_not_handled() {
        let mut error = import_error();
        error.error_type = ErrorType::PortConflict;
        error.category = ErrorType::PortConflict.category();
        assert!(!strategy("").can_handle(&error));
    }
}
