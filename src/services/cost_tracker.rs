//! Model-aware cost tracking with per-model pricing.
//!
//! LLM tiers price their calls from reported token usage; the tracker
//! accumulates spend per project and per tier across a run.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::models::{FixResult, FixTier};
use crate::domain::ports::Completion;

/// Pricing per million tokens for a specific model.
#[derive(Debug, Clone, Copy)]
pub struct ModelPricing {
    /// Cost per million input tokens (USD).
    pub input: f64,
    /// Cost per million output tokens (USD).
    pub output: f64,
}

/// Known model pricing table (costs in USD per million tokens).
///
/// Matched by substring, so aliases and dated ids resolve too.
const PRICING_TABLE: &[(&str, ModelPricing)] = &[
    ("opus", ModelPricing { input: 15.0, output: 75.0 }),
    ("sonnet", ModelPricing { input: 3.0, output: 15.0 }),
    ("haiku-4", ModelPricing { input: 1.0, output: 5.0 }),
    ("haiku", ModelPricing { input: 0.80, output: 4.0 }),
];

/// Get pricing for a model by name or alias.
pub fn get_model_pricing(model: &str) -> Option<ModelPricing> {
    let model_lower = model.to_lowercase();
    PRICING_TABLE
        .iter()
        .find(|(name, _)| model_lower.contains(name))
        .map(|(_, pricing)| *pricing)
}

/// Estimate cost in USD for a given set of token counts.
#[allow(clippy::cast_precision_loss)]
pub fn estimate_cost(model: &str, input_tokens: u64, output_tokens: u64) -> Option<f64> {
    let pricing = get_model_pricing(model)?;
    Some((input_tokens as f64 * pricing.input + output_tokens as f64 * pricing.output) / 1_000_000.0)
}

/// Cost of a completion, falling back to the tier's nominal price for
/// models missing from the table.
pub fn completion_cost(completion: &Completion, tier: FixTier) -> f64 {
    estimate_cost(
        &completion.model,
        completion.input_tokens,
        completion.output_tokens,
    )
    .unwrap_or_else(|| tier.nominal_cost())
}

/// Summary of fix spend.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CostSummary {
    /// Total spend in USD.
    pub total_usd: f64,
    /// Spend per tier.
    pub by_tier: HashMap<FixTier, f64>,
    /// Strategy invocations recorded.
    pub attempts: u32,
    /// Successful fixes counted.
    pub successes: u32,
}

impl CostSummary {
    /// Fold one fix result into the summary.
    pub fn add_result(&mut self, result: &FixResult) {
        self.attempts += 1;
        if result.success {
            self.successes += 1;
        }
        self.total_usd += result.cost;
        *self.by_tier.entry(result.tier).or_default() += result.cost;
    }

    /// Format as a human-readable summary.
    pub fn format_summary(&self) -> String {
        let mut s = format!(
            "Cost: ${:.4} ({} attempts, {} succeeded)",
            self.total_usd, self.attempts, self.successes
        );
        let mut tiers: Vec<_> = self.by_tier.iter().filter(|(_, c)| **c > 0.0).collect();
        if !tiers.is_empty() {
            tiers.sort_by_key(|(tier, _)| **tier);
            s.push_str("\n  By tier:");
            for (tier, cost) in tiers {
                s.push_str(&format!("\n    {tier}: ${cost:.4}"));
            }
        }
        s
    }
}

/// Accumulates costs per project and globally.
#[derive(Debug, Clone, Default)]
pub struct CostTracker {
    projects: Arc<RwLock<HashMap<String, CostSummary>>>,
    global: Arc<RwLock<CostSummary>>,
}

impl CostTracker {
    /// Empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a result to the global and project totals.
    pub async fn record(&self, project_id: &str, result: &FixResult) {
        self.global.write().await.add_result(result);
        self.projects
            .write()
            .await
            .entry(project_id.to_string())
            .or_default()
            .add_result(result);
    }

    /// Spend across every project.
    pub async fn global_summary(&self) -> CostSummary {
        self.global.read().await.clone()
    }

    /// Spend for one project, if it has any.
    pub async fn project_summary(&self, project_id: &str) -> Option<CostSummary> {
        self.projects.read().await.get(project_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::FixType;

    #[test]
    fn test_get_model_pricing() {
        assert!((get_model_pricing("claude-opus-4-1").unwrap().input - 15.0).abs() < f64::EPSILON);
        assert!((get_model_pricing("claude-haiku-4-5").unwrap().input - 1.0).abs() < f64::EPSILON);
        assert!((get_model_pricing("claude-3-5-haiku").unwrap().input - 0.8).abs() < f64::EPSILON);
        assert!(get_model_pricing("gpt-4o").is_none());
    }

    #[test]
    fn test_estimate_cost() {
        // 10K * 3 / 1M + 2K * 15 / 1M = 0.03 + 0.03
        let cost = estimate_cost("claude-sonnet-4-5", 10_000, 2_000).unwrap();
        assert!((cost - 0.06).abs() < 1e-9);
    }

    #[test]
    fn test_completion_cost_falls_back_to_nominal() {
        let completion = Completion {
            text: String::new(),
            model: "mystery-model".to_string(),
            input_tokens: 100,
            output_tokens: 100,
        };
        assert!((completion_cost(&completion, FixTier::Haiku) - 0.001).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_tracker_accumulates_per_project() {
        let tracker = CostTracker::new();
        let ok = FixResult::success(FixTier::Haiku, FixType::FileEdit).with_cost(0.002);
        let failed = FixResult::failure(FixTier::Sonnet, "bad patch").with_cost(0.01);

        tracker.record("web", &ok).await;
        tracker.record("web", &failed).await;
        tracker.record("api", &ok).await;

        let web = tracker.project_summary("web").await.unwrap();
        assert_eq!(web.attempts, 2);
        assert_eq!(web.successes, 1);
        assert!((web.total_usd - 0.012).abs() < 1e-9);

        let global = tracker.global_summary().await;
        assert_eq!(global.attempts, 3);
        assert!(global.format_summary().contains("sonnet: $0.0100"));
        assert!(tracker.project_summary("cli").await.is_none());
    }
}
