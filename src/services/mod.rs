//! Application services: classification, context, fix tiers and the
//! auto-fix loop.

pub mod auto_fixer;
pub mod classifier;
pub mod context_engine;
pub mod cost_tracker;
pub mod fix_executor;
pub mod fix_history;
pub mod fix_rate_limiter;
pub mod secret_scrubber;
pub mod strategies;

pub use auto_fixer::{AutoFixReport, FixBatch, UniversalAutoFixer};
pub use classifier::{ClassifierError, ErrorClassifier, RuleSet};
pub use context_engine::{ContextEngine, ImportGraph, ProjectSnapshot};
pub use cost_tracker::{estimate_cost, CostSummary, CostTracker};
pub use fix_executor::{FixExecutor, FixScope};
pub use fix_history::FixHistory;
pub use fix_rate_limiter::FixRateLimiter;
pub use secret_scrubber::SecretScrubber;
pub use strategies::{DeterministicStrategy, FixStrategy, HaikuStrategy, SonnetStrategy};
