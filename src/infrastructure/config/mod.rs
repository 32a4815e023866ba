//! Configuration management infrastructure
//!
//! Hierarchical configuration using figment: serialized defaults, project
//! YAML files and `AUTOFIX_*` environment overrides, validated after merge.

pub mod loader;

pub use loader::{ConfigError, ConfigLoader, CONFIG_DIR};
