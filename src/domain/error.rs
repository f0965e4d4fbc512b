//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// Domain errors represent share-ledger rule violations.
/// Every variant is recoverable: the failing operation has not mutated anything.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid fraction '{input}': {reason}")]
    Parse { input: String, reason: String },

    #[error("node not found: {0}")]
    NotFound(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("arithmetic error: {0}")]
    Arithmetic(String),
}

impl DomainError {
    pub fn parse(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidOperation(message.into())
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
