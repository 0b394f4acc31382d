//! Client error types.

use reqwest::StatusCode;
use thiserror::Error;

use crate::models::ApiErrorBody;

fn error_message(body: &Option<ApiErrorBody>) -> &str {
    match body {
        Some(body) if !body.error_message.is_empty() => &body.error_message,
        _ => "no error body",
    }
}

/// Errors returned by [`ManagerApi`](crate::ManagerApi) calls.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The manager answered with a non-success status.
    #[error("HTTP {status}: {}", error_message(.body))]
    Status {
        status: StatusCode,
        body: Option<ApiErrorBody>,
    },

    /// The request never produced a response (connect, TLS, timeout).
    #[error("transport: {0}")]
    Transport(String),

    /// The response body could not be decoded.
    #[error("decode: {0}")]
    Decode(String),

    /// Client construction failed.
    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl ClientError {
    /// Status code carried by a [`ClientError::Status`].
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClientError::Decode(e.to_string())
        } else if e.is_builder() {
            ClientError::Config(e.to_string())
        } else {
            ClientError::Transport(e.to_string())
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
