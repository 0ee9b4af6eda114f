//! Backend endpoint settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where the console backend lives and how to talk to it.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Base URL of the REST backend, without a trailing slash.
    pub base_url: String,
    /// Path of the session listing endpoint.
    pub sessions_path: String,
    /// Path of the server-sent notification stream.
    pub notifications_path: String,
    /// Per-request timeout for REST calls (the stream itself is untimed).
    pub request_timeout_ms: u64,
    /// Bearer token sent with every request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            sessions_path: "/api/v1/sessions".to_string(),
            notifications_path: "/api/v1/notifications/stream".to_string(),
            request_timeout_ms: 30_000,
            auth_token: None,
        }
    }
}

impl ServerSettings {
    /// Request timeout as a [`Duration`].
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Join the base URL and a path, tolerating a trailing slash on either side.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
