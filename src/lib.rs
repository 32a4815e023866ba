//! autofix - error classification and cost-tiered auto-fixing
//!
//! autofix reads build and runtime error output, classifies each error with
//! a data-driven rule table, and repairs what it can in escalating cost
//! tiers: deterministic fixes first, then a cheap model, then an expensive
//! one.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Error and fix models, port traits
//! - **Service Layer** (`services`): Classifier, context engine, fix tiers and the auto-fix loop
//! - **Infrastructure Layer** (`infrastructure`): Claude client, shell runner, filesystem, config, logging
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```no_run
//! use autofix::services::ErrorClassifier;
//!
//! let classifier = ErrorClassifier::builtin().expect("built-in rules load");
//! let error = classifier.classify("Error: Cannot find module 'express'", None, Some(1));
//! assert_eq!(error.suggested_action, "npm install express");
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::models::{
    ClassifiedError, Config, ErrorCategory, ErrorType, FixContext, FixEvent, FixOutcome,
    FixResult, FixStatus, FixTier, Language,
};
pub use domain::ports::{CommandRunner, LlmClient, ProjectFiles};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{ErrorClassifier, FixExecutor, UniversalAutoFixer};
