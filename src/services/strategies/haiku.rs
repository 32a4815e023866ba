//! Tier 2: cheap single-file search/replace fixes.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::prompt::{haiku_prompt, HAIKU_SYSTEM};
use super::response_parser::{apply_search_replace, extract_json, parse_search_replace};
use super::{elapsed_ms, FixStrategy};
use crate::domain::models::{ClassifiedError, FixContext, FixResult, FixTier, FixType};
use crate::domain::ports::{CompletionRequest, LlmClient, ModelAlias, ProjectFilesFactory};
use crate::services::cost_tracker::completion_cost;
use crate::services::secret_scrubber::SecretScrubber;

const MAX_TOKENS: u32 = 2_048;

/// Tier 2: single-file search/replace from the cheap model.
pub struct HaikuStrategy {
    llm: Arc<dyn LlmClient>,
    files: ProjectFilesFactory,
    scrubber: SecretScrubber,
}

impl HaikuStrategy {
    /// Strategy over `llm`, editing files through `files`.
    pub fn new(llm: Arc<dyn LlmClient>, files: ProjectFilesFactory) -> Self {
        Self {
            llm,
            files,
            scrubber: SecretScrubber::new(),
        }
    }

    /// File the classifier located, else the context's primary file.
    fn target_path<'a>(error: &'a ClassifiedError, context: &'a FixContext) -> Option<&'a str> {
        error
            .file_path
            .as_deref()
            .or_else(|| context.primary_file.as_ref().map(|f| f.path.as_str()))
    }
}

#[async_trait]
impl FixStrategy for HaikuStrategy {
    fn name(&self) -> &'static str {
        "haiku"
    }

    fn tier(&self) -> FixTier {
        FixTier::Haiku
    }

    fn can_handle(&self, error: &ClassifiedError) -> bool {
        error.is_claude_fixable && error.category.is_single_file() && error.file_path.is_some()
    }

    async fn fix(&self, error: &ClassifiedError, context: &FixContext) -> FixResult {
        let started = Instant::now();
        let Some(path) = Self::target_path(error, context) else {
            return FixResult::failure(FixTier::Haiku, "no file to edit");
        };
        let files = (self.files)(&context.project_root);
        let original = match files.read(path).await {
            Ok(content) => content,
            Err(e) => {
                return FixResult::failure(FixTier::Haiku, e.to_string()).with_time(elapsed_ms(started))
            }
        };

        let request = CompletionRequest {
            model: ModelAlias::Haiku,
            system: HAIKU_SYSTEM.to_string(),
            prompt: haiku_prompt(&self.scrubber, error, context, path, &original),
            max_tokens: MAX_TOKENS,
            temperature: 0.0,
        };
        let completion = match self.llm.complete(request).await {
            Ok(completion) => completion,
            Err(e) => {
                warn!(error = %e, "Haiku request failed");
                return FixResult::failure(FixTier::Haiku, e.to_string()).with_time(elapsed_ms(started));
            }
        };
        let cost = completion_cost(&completion, FixTier::Haiku);
        let fail = |reason: String| {
            FixResult::failure(FixTier::Haiku, reason)
                .with_cost(cost)
                .with_time(elapsed_ms(started))
        };

        let Some(json) = extract_json(&completion.text) else {
            return fail("no JSON in response".to_string());
        };
        let edits = parse_search_replace(&json);
        if edits.is_empty() {
            return fail("response has no search/replace pairs".to_string());
        }
        debug!(path = %path, edits = edits.len(), "Applying search/replace edits");

        let updated = match apply_search_replace(&original, &edits) {
            Ok(updated) if updated != original => updated,
            Ok(_) => return fail("edits left the file unchanged".to_string()),
            Err(e) => return fail(e),
        };
        if let Err(e) = files.write(path, &updated).await {
            return fail(e.to_string());
        }

        info!(path = %path, cost, "Haiku fix applied");
        FixResult::success(FixTier::Haiku, FixType::FileEdit)
            .with_files(vec![path.into()])
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
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct CannedLlm {
        answer: String,
        prompts: Mutex<Vec<CompletionRequest>>,
    }

    impl CannedLlm {
        fn new(answer: &str) -> Arc<Self> {
            Arc::new(Self {
                answer: answer.to_string(),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmClient for CannedLlm {
        async fn complete(&self, request: CompletionRequest) -> Result<Completion, LlmError> {
            self.prompts.lock().unwrap().push(request);
            Ok(Completion {
                text: self.answer.clone(),
                model: "claude-haiku-4-5".into(),
                input_tokens: 1_000,
                output_tokens: 100,
            })
        }
    }

    fn syntax_error(file: Option<&str>) -> ClassifiedError {
        ClassifiedError {
            error_type: ErrorType::Syntax,
            category: ErrorType::Syntax.category(),
            language: Language::JavaScript,
            is_claude_fixable: true,
            file_path: file.map(String::from),
            line_number: Some(1),
            original_message: "SyntaxError: missing ) after argument list".into(),
            suggested_action: String::new(),
            confidence: 0.9,
            extracted_context: BTreeMap::new(),
            rule_id: Some("js-syntax".into()),
        }
    }

    #[test]
    fn needs_a_known_file() {
        let s = HaikuStrategy::new(CannedLlm::new("{}"), FsProjectFiles::factory());
        assert!(s.can_handle(&syntax_error(Some("index.js"))));
        assert!(!s.can_handle(&syntax_error(None)));
    }

    #[tokio::test]
    async fn applies_search_replace_and_reports_cost() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.js"), "console.log('hi';\n").unwrap();
        let llm = CannedLlm::new(
            "```json\n{\"fixes\":[{\"search\":\"log('hi';\",\"replace\":\"log('hi');\"}],\"explanation\":\"close paren\"}\n```",
        );
        let s = HaikuStrategy::new(llm.clone(), FsProjectFiles::factory());

        let result = s
            .fix(
                &syntax_error(Some("index.js")),
                &FixContext::new(dir.path(), Language::JavaScript, ""),
            )
            .await;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.fix_type, FixType::FileEdit);
        assert!(result.cost > 0.0);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("index.js")).unwrap(),
            "console.log('hi');\n"
        );
        assert_eq!(llm.prompts.lock().unwrap()[0].model, ModelAlias::Haiku);
    }

    #[tokio::test]
    async fn unmatched_search_fails_without_writing() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.js"), "let a = 1\n").unwrap();
        let llm = CannedLlm::new(r#"{"search":"nope","replace":"x"}"#);
        let s = HaikuStrategy::new(llm, FsProjectFiles::factory());

        let result = s
            .fix(
                &syntax_error(Some("index.js")),
                &FixContext::new(dir.path(), Language::JavaScript, ""),
            )
            .await;

        assert!(!result.success);
        assert!(result.cost > 0.0);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("index.js")).unwrap(),
            "let a = 1\n"
        );
    }
}
