use thiserror::Error;

use crate::database::StoreError;

/// Failure taxonomy shared by the policy and workflow layers.
///
/// Each variant maps onto one HTTP status in [`crate::Response`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CrmError {
    /// missing or malformed input
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthenticated(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    /// the operation conflicts with an entity invariant
    #[error("{0}")]
    InvalidState(String),
    /// unexpected failure, the message is logged but never sent to the caller
    #[error("{0}")]
    Internal(String),
}

impl CrmError {
    pub fn validation(e: impl Into<String>) -> Self {
        Self::Validation(e.into())
    }
    pub fn forbidden(e: impl Into<String>) -> Self {
        Self::Forbidden(e.into())
    }
    pub fn not_found(e: impl Into<String>) -> Self {
        Self::NotFound(e.into())
    }
    pub fn invalid_state(e: impl Into<String>) -> Self {
        Self::InvalidState(e.into())
    }
}

impl From<StoreError> for CrmError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Duplicate(msg) => CrmError::Validation(msg),
            StoreError::Conflict(msg) => CrmError::InvalidState(msg),
            e => CrmError::Internal(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for CrmError {
    fn from(value: serde_json::Error) -> Self {
        CrmError::Validation(value.to_string())
    }
}

pub type CrmResult<T> = Result<T, CrmError>;
