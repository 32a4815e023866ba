//! Fix strategies, one per cost tier.
//!
//! A strategy reports failure as a [`FixResult`] value and never escalates
//! on its own; the executor decides which tier runs next.

pub mod deterministic;
pub mod haiku;
pub(crate) mod prompt;
pub(crate) mod response_parser;
pub mod sonnet;

use async_trait::async_trait;

use crate::domain::models::{ClassifiedError, FixContext, FixResult, FixTier};

pub use deterministic::DeterministicStrategy;
pub use haiku::HaikuStrategy;
pub use response_parser::is_complete_file;
pub use sonnet::SonnetStrategy;

/// One fix tier.
#[async_trait]
pub trait FixStrategy: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Tier this strategy implements.
    fn tier(&self) -> FixTier;

    /// Whether this tier should try the error at all.
    fn can_handle(&self, error: &ClassifiedError) -> bool;

    /// Attempt the fix; failures come back as an unsuccessful result.
    async fn fix(&self, error: &ClassifiedError, context: &FixContext) -> FixResult;
}

pub(crate) fn elapsed_ms(started: std::time::Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
