//! # Ability Test Utilities
//!
//! Shared testing infrastructure for the ability engine:
//! - Fixtures and scenario builders
//! - Determinism verification harness
//! - Property-based testing strategies

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod determinism;
pub mod fixtures;

// Re-export proptest for convenience
pub use proptest;
