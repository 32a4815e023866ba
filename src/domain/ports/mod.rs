//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces that infrastructure adapters must implement:
//! - LlmClient: language model completions
//! - CommandRunner: shell commands with hard timeouts
//! - ProjectFiles: file access confined to a project root
//!
//! These traits keep the classifier and fix tiers independent of the
//! concrete HTTP client, process spawning and filesystem.

/// Shell command port
pub mod command_runner;
/// Port error types
pub mod errors;
/// Language model port
pub mod llm_client;
/// Project file access port
pub mod project_files;

pub use command_runner::{CommandOutput, CommandRunner};
pub use errors::{FileError, LlmError, ProcessError};
pub use llm_client::{Completion, CompletionRequest, LlmClient, ModelAlias};
pub use project_files::{ProjectFiles, ProjectFilesFactory};
