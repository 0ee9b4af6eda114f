//! Error types shared across crates.

use thiserror::Error;

/// Failure of a [`SessionDirectory`](crate::sessions::SessionDirectory) lookup.
///
/// Lookups are best-effort: callers classify but never propagate these.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DirectoryError {
    /// The listing endpoint (or the session) does not exist yet.
    #[error("session listing not found")]
    NotFound,
    /// Non-success HTTP status other than 404.
    #[error("session listing returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body (possibly truncated).
        body: String,
    },
    /// Transport failure (connect, timeout, reset).
    #[error("network error: {0}")]
    Network(String),
    /// Response body was not a session listing.
    #[error("failed to decode session listing: {0}")]
    Decode(String),
}

impl DirectoryError {
    /// Whether the failure only means "not visible yet".
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Short classification string for logging.
    #[must_use]
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Status { .. } => "status",
            Self::Network(_) => "network",
            Self::Decode(_) => "decode",
        }
    }
}
