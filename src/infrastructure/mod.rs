//! Infrastructure layer module
//!
//! Adapters for the outside world:
//! - Claude Messages API client
//! - Shell command execution
//! - Project filesystem access
//! - Configuration management
//! - Logging
//!
//! Infrastructure implementations satisfy the port traits defined in the domain layer.

pub mod claude;
pub mod config;
pub mod files;
pub mod logging;
pub mod process;
