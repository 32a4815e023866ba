//! Implementation of the `autofix rules` command.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::cli::output::{list_table, output, render_list, truncate, CommandOutput};
use crate::domain::models::{Config, ErrorCategory, ErrorType};
use crate::services::ErrorClassifier;

/// Arguments for `autofix rules`.
#[derive(Args, Debug)]
pub struct RulesArgs {
    /// Only rules for this language (e.g. `python`); rules without a language always match
    #[arg(long)]
    pub language: Option<String>,

    /// Hide rules for errors that need manual action
    #[arg(long)]
    pub fixable_only: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct RuleRow {
    pub id: String,
    pub error_type: ErrorType,
    pub category: ErrorCategory,
    pub language: Option<String>,
    pub fixable: bool,
    pub confidence: f32,
    pub action: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct RulesOutput {
    pub rules: Vec<RuleRow>,
    pub total: usize,
}

impl CommandOutput for RulesOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["id", "type", "language", "fixable", "conf", "action"]);
        for rule in &self.rules {
            table.add_row(vec![
                rule.id.clone(),
                rule.error_type.to_string(),
                rule.language.clone().unwrap_or_else(|| "-".to_string()),
                if rule.fixable { "yes".into() } else { "no".into() },
                format!("{:.2}", rule.confidence),
                truncate(&rule.action, 60),
            ]);
        }
        render_list("rule", &table, self.total)
    }
}

/// List the loaded classifier rules.
pub async fn execute(args: RulesArgs, config: &Config, json_mode: bool) -> Result<()> {
    let classifier =
        ErrorClassifier::from_config(&config.classifier).context("Failed to load classifier rules")?;
    let language = args.language.as_deref().map(str::to_lowercase);

    let rules: Vec<RuleRow> = classifier
        .rules()
        .iter()
        .filter(|rule| !args.fixable_only || rule.fixable)
        .filter(|rule| match (&language, rule.language) {
            (Some(wanted), Some(lang)) => lang.as_str() == wanted,
            _ => true,
        })
        .map(|rule| RuleRow {
            id: rule.id.clone(),
            error_type: rule.error_type,
            category: rule.error_type.category(),
            language: rule.language.map(|l| l.as_str().to_string()),
            fixable: rule.fixable,
            confidence: rule.confidence,
            action: rule.action.clone(),
        })
        .collect();

    let total = rules.len();
    output(&RulesOutput { rules, total }, json_mode);
    Ok(())
}
