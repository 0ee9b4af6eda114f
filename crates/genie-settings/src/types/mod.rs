//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and `#[serde(default)]`,
//! so a settings file may contain any subset of fields.

mod server;
mod tracker;

pub use server::*;
pub use tracker::*;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// # JSON Format
///
/// ```json
/// {
///   "server": { "baseUrl": "https://console.example.com" },
///   "tracker": { "sessionLookupDelayMs": 2000 }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenieSettings {
    /// Settings schema version.
    pub version: String,
    /// Application name.
    pub name: String,
    /// Backend endpoints and HTTP behavior.
    pub server: ServerSettings,
    /// Coordination tracker timing and limits.
    pub tracker: TrackerSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for GenieSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            name: "genie".to_string(),
            server: ServerSettings::default(),
            tracker: TrackerSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl GenieSettings {
    /// Reject values no component can work with.
    pub fn validate(&self) -> Result<()> {
        let base = self.server.base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(SettingsError::InvalidValue(format!(
                "server.baseUrl must be an http(s) URL, got {base:?}"
            )));
        }
        if self.tracker.session_lookup_limit == 0 {
            return Err(SettingsError::InvalidValue(
                "tracker.sessionLookupLimit must be > 0".to_string(),
            ));
        }
        if self.tracker.result_preview_chars == 0 {
            return Err(SettingsError::InvalidValue(
                "tracker.resultPreviewChars must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive (overridden by `RUST_LOG`).
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
