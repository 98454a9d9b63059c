//! Error types for the authorization engine

use thiserror::Error;

/// Authorization engine errors
#[derive(Debug, Error)]
pub enum AuthzError {
    /// Unknown role or permission name
    #[error("Validation error: {0}")]
    Validation(String),

    /// User or section record missing
    #[error("Not found: {0}")]
    NotFound(String),

    /// Actor lacks authority for the requested mutation
    #[error("Permission denied: {0}")]
    Permission(String),

    /// Record store failure
    #[error("Store error: {0}")]
    Store(String),

    /// Cache failure
    #[error("Cache error: {0}")]
    Cache(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// I/O error from a store adapter
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AuthzError {
    /// True for errors the acting administrator caused (bad input, missing
    /// target, insufficient authority), as opposed to infrastructure failures.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            AuthzError::Validation(_) | AuthzError::NotFound(_) | AuthzError::Permission(_)
        )
    }
}

/// Result type for authorization operations
pub type Result<T> = std::result::Result<T, AuthzError>;
