//! Domain models.

pub mod classified_error;
pub mod config;
pub mod context;
pub mod event;
pub mod fix;

pub use classified_error::{ClassifiedError, ErrorCategory, ErrorType, Language};
pub use config::{
    ClassifierConfig, ClaudeConfig, Config, ContextConfig, ExecutorConfig, FixLimitsConfig,
    LoggingConfig, ModelsConfig, StrategiesConfig,
};
pub use context::{ContextFile, FixContext, MissingModule};
pub use event::{FixEvent, FixEventType};
pub use fix::{FixAttempt, FixOutcome, FixResult, FixStatus, FixTier, FixType, SkipReason};
