//! Store error types.

use nsxt_sdk::{ApiErrorBody, StatusCode};
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Object not found.
    #[error("The requested object : {0} could not be found. Object identifiers are case sensitive.")]
    NotFound(String),

    /// Revision mismatch (optimistic concurrency control).
    #[error("The object was modified by somebody else: expected revision {expected}, got {actual}")]
    RevisionMismatch { expected: i64, actual: i64 },

    /// Request payload rejected.
    #[error("invalid request: {0}")]
    Invalid(String),
}

impl StoreError {
    /// Manager error code reported in the error body.
    pub fn error_code(&self) -> i64 {
        match self {
            StoreError::NotFound(_) => 600,
            StoreError::RevisionMismatch { .. } => 604,
            StoreError::Invalid(_) => 255,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::RevisionMismatch { .. } => StatusCode::PRECONDITION_FAILED,
            StoreError::Invalid(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Error body in the manager's wire format.
    pub fn to_body(&self) -> ApiErrorBody {
        let status = self.status();
        ApiErrorBody {
            http_status: status
                .canonical_reason()
                .map(|r| r.to_uppercase().replace(' ', "_")),
            error_code: Some(self.error_code()),
            module_name: Some("common-services".to_string()),
            error_message: self.to_string(),
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
