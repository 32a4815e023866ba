//! Implementation of the `autofix context` command.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::read_arg_or_stdin;
use crate::cli::app::resolve_dir;
use crate::cli::output::{detail_table, list_table, output, CommandOutput};
use crate::domain::models::{Config, Language, MissingModule};
use crate::services::{ContextEngine, ErrorClassifier};

/// Arguments for `autofix context`.
#[derive(Args, Debug)]
pub struct ContextArgs {
    /// Project directory
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,

    /// Error text; shows the files a fix prompt would include (`-` reads stdin)
    #[arg(long)]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PromptFile {
    pub path: String,
    pub bytes: usize,
    pub truncated: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct ContextOutput {
    pub root: PathBuf,
    pub language: Language,
    pub files_scanned: usize,
    pub truncated: bool,
    pub files_by_language: BTreeMap<String, usize>,
    pub import_edges: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_files: Option<Vec<PromptFile>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_modules: Vec<MissingModule>,
}

impl CommandOutput for ContextOutput {
    fn to_human(&self) -> String {
        let by_language = self
            .files_by_language
            .iter()
            .map(|(lang, count)| format!("{lang}: {count}"))
            .collect::<Vec<_>>()
            .join(", ");
        let scanned = if self.truncated {
            format!("{} (limit reached)", self.files_scanned)
        } else {
            self.files_scanned.to_string()
        };
        let mut out = detail_table(&[
            ("Root", self.root.display().to_string()),
            ("Language", self.language.to_string()),
            ("Files", scanned),
            ("By language", by_language),
            ("Import edges", self.import_edges.to_string()),
        ])
        .to_string();

        if let Some(files) = &self.prompt_files {
            let mut table = list_table(&["file", "bytes", "truncated"]);
            for file in files {
                table.add_row(vec![
                    file.path.clone(),
                    file.bytes.to_string(),
                    if file.truncated { "yes".into() } else { String::new() },
                ]);
            }
            out.push_str(&format!("\n\nPrompt files:\n{table}"));
        }
        if !self.missing_modules.is_empty() {
            let names: Vec<&str> = self.missing_modules.iter().map(|m| m.name.as_str()).collect();
            out.push_str(&format!("\nMissing modules: {}", names.join(", ")));
        }
        out
    }
}

/// Scan a project and print what the context engine found.
pub async fn execute(args: ContextArgs, config: &Config, json_mode: bool) -> Result<()> {
    let root = resolve_dir(&args.dir)?;
    let engine = ContextEngine::new(config.context.clone());

    let scan_root = root.clone();
    let scan_engine = engine.clone();
    let (snapshot, edges) = tokio::task::spawn_blocking(move || {
        let snapshot = scan_engine.scan(&scan_root);
        let edges = scan_engine.import_graph(&snapshot).edge_count();
        (snapshot, edges)
    })
    .await
    .context("Project scan task failed")?;

    let mut files_by_language = BTreeMap::new();
    for file in &snapshot.files {
        *files_by_language
            .entry(file.language.as_str().to_string())
            .or_insert(0) += 1;
    }

    let (prompt_files, missing_modules) = match &args.error {
        Some(error) => {
            let text = read_arg_or_stdin(error).await?;
            let classifier = ErrorClassifier::from_config(&config.classifier)
                .context("Failed to load classifier rules")?;
            let classified = classifier.classify_for(&text, None, None, snapshot.language);
            let context = engine.build_context(&root, &classified, &text).await;
            let files = context
                .files()
                .map(|f| PromptFile {
                    path: f.path.clone(),
                    bytes: f.content.len(),
                    truncated: f.truncated,
                })
                .collect();
            (Some(files), context.missing_modules)
        }
        None => (None, Vec::new()),
    };

    output(
        &ContextOutput {
            root,
            language: snapshot.language,
            files_scanned: snapshot.files.len(),
            truncated: snapshot.truncated,
            files_by_language,
            import_edges: edges,
            prompt_files,
            missing_modules,
        },
        json_mode,
    );
    Ok(())
}
