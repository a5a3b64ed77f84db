//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic failures found while interpreting
/// records (malformed stubs, bad identifiers). Remote and transport failures
/// belong to the orchestration layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A record failed validation (e.g. a sub-object reference of the wrong shape).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (empty, or not usable as a path segment).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}
