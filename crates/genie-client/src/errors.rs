//! Client error types.

use genie_core::errors::DirectoryError;

/// Errors that can occur when talking to the console backend.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport failure (connect, timeout, reset, body read).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("server returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body (truncated).
        body: String,
    },

    /// The response body did not have the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// A URL could not be built from the configured base and path.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl ClientError {
    /// Whether the server answered 404.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

impl From<ClientError> for DirectoryError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Status { status: 404, .. } => Self::NotFound,
            ClientError::Status { status, body } => Self::Status { status, body },
            ClientError::Network(e) => Self::Network(e.to_string()),
            ClientError::Decode(msg) => Self::Decode(msg),
            ClientError::InvalidUrl(msg) => Self::Network(format!("invalid URL: {msg}")),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
