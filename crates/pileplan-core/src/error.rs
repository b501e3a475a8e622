//! Error types for PilePlan

use thiserror::Error;

/// Main error type for PilePlan operations
#[derive(Debug, Error)]
pub enum PilePlanError {
    /// Malformed or contradictory solve request, rejected before any
    /// model is built
    #[error("Validation error: {0}")]
    Validation(String),

    /// Invalid configuration value (unknown pile type, bad scenario)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error (should not occur in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for PilePlan operations
pub type Result<T> = std::result::Result<T, PilePlanError>;
