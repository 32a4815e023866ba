//! Domain layer for autofix
//!
//! This module contains the error/fix models and the port traits the
//! services depend on.

pub mod errors;
pub mod models;
pub mod ports;

// Re-export error types for convenient access
pub use errors::{DomainError, DomainResult};
