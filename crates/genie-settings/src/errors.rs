//! Settings error types.

use std::path::PathBuf;

use thiserror::Error;

/// Why the Genie settings could not be loaded.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        /// Settings file.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },
    /// The settings file is not valid JSON.
    #[error("{} is not valid JSON: {source}", .path.display())]
    Parse {
        /// Settings file.
        path: PathBuf,
        /// Parser failure.
        source: serde_json::Error,
    },
    /// The merged document does not fit the settings schema, for example a
    /// string where `tracker.sessionLookupDelayMs` expects a number.
    #[error("settings do not match the schema: {0}")]
    Schema(#[from] serde_json::Error),
    /// A value parsed but cannot be used, such as a non-HTTP
    /// `server.baseUrl` or a zero `tracker.sessionLookupLimit`.
    #[error("invalid settings value: {0}")]
    InvalidValue(String),
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;
