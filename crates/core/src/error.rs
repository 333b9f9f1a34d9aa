//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every failure a caller can observe maps to exactly one variant, so callers
/// branch on the variant (or on [`ErrorKind`]) instead of parsing messages.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed or missing input. The operation was never attempted.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced record does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// An outcome or transfer would drive a balance below zero.
    #[error("insufficient stock (requested: {requested}, available: {available})")]
    InsufficientStock { requested: u64, available: u64 },

    /// The requester's role does not allow the action.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Uniqueness violation, illegal state transition or restricted delete.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Unexpected failure mid-operation; nothing was committed.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Field-less discriminant of [`DomainError`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    InsufficientStock,
    PermissionDenied,
    Conflict,
    Internal,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(what: &'static str) -> Self {
        Self::NotFound(what)
    }

    pub fn insufficient(requested: u64, available: u64) -> Self {
        Self::InsufficientStock {
            requested,
            available,
        }
    }

    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Lock poisoning means a writer panicked mid-update.
    pub fn poisoned(what: &str) -> Self {
        Self::Internal(format!("{what} lock poisoned"))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Validation(_) => ErrorKind::Validation,
            DomainError::NotFound(_) => ErrorKind::NotFound,
            DomainError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            DomainError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            DomainError::Conflict(_) => ErrorKind::Conflict,
            DomainError::Internal(_) => ErrorKind::Internal,
        }
    }
}
