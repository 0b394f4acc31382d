//! Provider error types.

use nsxt_sdk::ClientError;
use thiserror::Error;

use crate::model::RemoteRecord;
use crate::schema::AttributeType;

/// A raw configuration rejected before any remote call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{resource_type}: unsupported argument \"{attribute}\"")]
    UnknownAttribute {
        resource_type: String,
        attribute: String,
    },

    #[error("{resource_type}: the argument \"{attribute}\" is required")]
    MissingAttribute {
        resource_type: String,
        attribute: String,
    },

    #[error("{resource_type}: \"{attribute}\" expects {expected}, got {found}")]
    TypeMismatch {
        resource_type: String,
        attribute: String,
        expected: AttributeType,
        found: String,
    },

    #[error("{resource_type}: invalid value for \"{attribute}\": {message}")]
    InvalidValue {
        resource_type: String,
        attribute: String,
        message: String,
    },
}

/// Errors surfaced by reconciliation operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Bad input; never reaches the manager.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The remote object is absent.
    #[error("{resource_type} {id} not found")]
    NotFound { resource_type: String, id: String },

    /// Non-success status or connectivity failure; never retried.
    #[error("{operation} failed: {source}")]
    Transport {
        operation: String,
        #[source]
        source: ClientError,
    },

    /// A call succeeded but answered with something other than what was asked for.
    #[error("inconsistent result: {0}")]
    Consistency(String),

    /// A create succeeded but the object never became readable. Carries the
    /// record the create answered with so the object stays tracked.
    #[error(
        "{resource_type} {} was created but is not readable after {attempts} attempts",
        record.id
    )]
    NotVisible {
        resource_type: String,
        attempts: u32,
        record: Box<RemoteRecord>,
    },

    #[error("unknown resource type \"{0}\"")]
    UnknownResourceType(String),

    #[error("configuration: {0}")]
    Config(String),

    /// Unreadable or unwritable state document.
    #[error("state: {0}")]
    State(String),
}

impl ProviderError {
    pub fn transport(operation: impl Into<String>, source: ClientError) -> Self {
        ProviderError::Transport {
            operation: operation.into(),
            source,
        }
    }

    pub fn not_found(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        ProviderError::NotFound {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::NotFound { .. })
    }

    pub fn is_consistency(&self) -> bool {
        matches!(
            self,
            ProviderError::Consistency(_) | ProviderError::NotVisible { .. }
        )
    }

    /// The object a failed create left behind on the manager, if any.
    pub fn created_record(&self) -> Option<&RemoteRecord> {
        match self {
            ProviderError::NotVisible { record, .. } => Some(record),
            _ => None,
        }
    }
}

/// Result type for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;
