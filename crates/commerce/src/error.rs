//! Commerce error types.

use thiserror::Error;
use workflow::{FailureKind, ResolutionError, StepError, TransactionError};

/// Errors raised by the commerce services.
#[derive(Debug, Error)]
pub enum CommerceError {
    /// An entity does not exist.
    #[error("{entity} with id {id} was not found")]
    NotFound { entity: &'static str, id: String },

    /// The request data was rejected.
    #[error("Invalid data: {0}")]
    Invalid(String),

    /// The operation conflicts with stored data.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A payment or fulfillment provider failed.
    #[error("Provider error: {0}")]
    Provider(String),

    /// The transaction could not be used.
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// A module service is not registered.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

impl CommerceError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        CommerceError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Classifies the error.
    pub fn kind(&self) -> FailureKind {
        match self {
            CommerceError::NotFound { .. } => FailureKind::NotFound,
            CommerceError::Invalid(_) => FailureKind::Invalid,
            CommerceError::Conflict(_) => FailureKind::Conflict,
            CommerceError::Provider(_)
            | CommerceError::Transaction(_)
            | CommerceError::Resolution(_) => FailureKind::Unexpected,
        }
    }
}

impl From<CommerceError> for StepError {
    fn from(err: CommerceError) -> Self {
        match err {
            CommerceError::NotFound { .. } => StepError::NotFound(err.to_string()),
            CommerceError::Invalid(reason) => StepError::Invalid(reason),
            CommerceError::Conflict(reason) => StepError::Conflict(reason),
            CommerceError::Provider(reason) => StepError::Service(reason),
            CommerceError::Transaction(err) => StepError::Transaction(err),
            CommerceError::Resolution(err) => StepError::Resolution(err),
        }
    }
}
