//! Application error types

use thiserror::Error;
use weft_domain::DomainError;

use crate::drawer::DrawerError;
use crate::ports::StoreError;
use crate::use_cases::CommitError;

/// Application-level errors.
///
/// Each layer has its own precise error type; this enum is what callers that
/// do not care about the distinction (the CLI, for one) propagate.
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// A domain validation error occurred.
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),

    /// A store call failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A drawer operation was rejected.
    #[error("drawer error: {0}")]
    Drawer(#[from] DrawerError),

    /// A commit failed.
    #[error("commit failed: {0}")]
    Commit(#[from] CommitError),

    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
}

/// Result type alias for application operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
