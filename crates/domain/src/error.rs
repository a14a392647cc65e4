//! Domain error types

use thiserror::Error;

/// Domain-level errors that can occur during validation or processing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A variable name is empty or otherwise unusable as a reference target.
    #[error("invalid variable name: {0:?}")]
    InvalidName(String),

    /// Two nodes of the same project share an effective name.
    #[error("duplicate variable name: {0}")]
    DuplicateName(String),

    /// The referenced node does not exist in the project snapshot.
    #[error("node not found: {0}")]
    NodeNotFound(String),

    /// A draft is structurally invalid (for example, a spawn slot that does not exist).
    #[error("invalid draft: {0}")]
    InvalidDraft(String),
}

/// Result type alias for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
