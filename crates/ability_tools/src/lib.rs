//! # Ability Development Tools
//!
//! Command-line tools for development:
//! - Catalog validation
//! - Headless skirmish runs with an event log

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod skirmish;
pub mod validate;

use thiserror::Error;

/// Error type for tool operations.
#[derive(Error, Debug)]
pub enum ToolError {
    /// Failed to read or list files.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path being read.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },
    /// Directory held no data files.
    #[error("No .ron files found in {0}")]
    NoDataFiles(String),
    /// Failed to parse a scenario.
    #[error("Failed to parse scenario {path}: {message}")]
    Scenario {
        /// Scenario source.
        path: String,
        /// Parser message.
        message: String,
    },
    /// Engine rejected the data.
    #[error(transparent)]
    Engine(#[from] ability_core::error::EngineError),
    /// Failed to write JSON output.
    #[error("Failed to encode report: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for tool operations.
pub type Result<T> = std::result::Result<T, ToolError>;

/// Read a whole file, tagging errors with its path.
///
/// # Errors
///
/// Returns [`ToolError::Io`] if the file cannot be read.
pub fn read_file(path: &std::path::Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| ToolError::Io {
        path: path.display().to_string(),
        source,
    })
}
