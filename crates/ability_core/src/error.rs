//! Error types for the ability engine.
//!
//! Only configuration and host-facing lookups produce errors. Runtime
//! outcomes such as a missing target or an empty resource pool are normal
//! state-machine transitions and never surface here.

use thiserror::Error;

/// Result type alias using [`EngineError`].
pub type Result<T> = std::result::Result<T, EngineError>;

/// Top-level error type for the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Authored configuration failed validation.
    #[error("Invalid configuration for '{context}': {reason}")]
    InvalidConfig {
        /// Unit type or ability the error belongs to.
        context: String,
        /// What was wrong with it.
        reason: String,
    },

    /// No unit type with this id is registered in the catalog.
    #[error("Unknown unit type: {0}")]
    UnknownUnitType(String),

    /// Invalid entity reference.
    #[error("Entity not found: {0}")]
    EntityNotFound(u64),

    /// Data file parsing error.
    #[error("Failed to parse data file '{path}': {message}")]
    DataParseError {
        /// Path (or label) of the source that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// Invalid engine state.
    #[error("Invalid engine state: {0}")]
    InvalidState(String),
}

impl EngineError {
    /// Shorthand for an [`EngineError::InvalidConfig`].
    pub fn config(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            context: context.into(),
            reason: reason.into(),
        }
    }
}
