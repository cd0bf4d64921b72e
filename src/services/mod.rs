pub mod account;
pub mod property;

pub use account::AccountService;
pub use property::PropertyService;

use thiserror::Error;

use crate::database::DatabaseError;

/// Domain-level failures surfaced by the services. Validation, not-found and
/// authorization outcomes are expected control flow; `Database` wraps the
/// persistence layer and is reported to clients only generically.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl ServiceError {
    pub fn not_found(message: impl Into<String>) -> Self {
        ServiceError::NotFound(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ServiceError::Forbidden(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ServiceError::Conflict(message.into())
    }
}
