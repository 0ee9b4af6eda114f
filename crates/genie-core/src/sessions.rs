//! Session listing abstraction.
//!
//! The tracker only needs one thing from the backend's session API: a page of
//! recent sessions, so that a freshly created delegate session can be shown
//! in the companion session list. [`SessionDirectory`] is that seam; the HTTP
//! implementation lives in `genie-client`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::de::opt_string;
use crate::errors::DirectoryError;
use crate::ids::{ProfileTag, SessionId};

/// One entry of a session listing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Session ID.
    #[serde(alias = "session_id")]
    pub id: SessionId,
    /// Display title.
    #[serde(default, alias = "title", deserialize_with = "opt_string")]
    pub name: Option<String>,
    /// Profile that owns the session.
    #[serde(default, deserialize_with = "opt_string")]
    pub profile_tag: Option<ProfileTag>,
    /// Parent session, for delegate sessions.
    #[serde(default, deserialize_with = "opt_string")]
    pub parent_session_id: Option<SessionId>,
    /// Creation timestamp as reported by the server.
    #[serde(default, deserialize_with = "opt_string")]
    pub created_at: Option<String>,
}

impl SessionSummary {
    /// Minimal summary carrying only an ID.
    #[must_use]
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            name: None,
            profile_tag: None,
            parent_session_id: None,
            created_at: None,
        }
    }

    /// Title to show in a list: the name, else the ID.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.id.as_str())
    }
}

/// Paged session listing.
#[async_trait]
pub trait SessionDirectory: Send + Sync {
    /// Fetch one page of sessions, newest first.
    async fn list_sessions(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<SessionSummary>, DirectoryError>;
}
