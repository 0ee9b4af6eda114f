//! Coordination tracker settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timing and limits of the coordination tracker's deferred work.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackerSettings {
    /// Delay between a coordination start and expanding its UI group.
    pub expand_delay_ms: u64,
    /// Delay before looking up a freshly spawned delegate session.
    pub session_lookup_delay_ms: u64,
    /// Page size of the delegate-session lookup.
    pub session_lookup_limit: u32,
    /// Page offset of the delegate-session lookup.
    pub session_lookup_offset: u32,
    /// Maximum characters kept when only a result preview is stored.
    pub result_preview_chars: usize,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            expand_delay_ms: 100,
            session_lookup_delay_ms: 1500,
            session_lookup_limit: 50,
            session_lookup_offset: 0,
            result_preview_chars: 200,
        }
    }
}

impl TrackerSettings {
    /// Expand delay as a [`Duration`].
    #[must_use]
    pub fn expand_delay(&self) -> Duration {
        Duration::from_millis(self.expand_delay_ms)
    }

    /// Lookup delay as a [`Duration`].
    #[must_use]
    pub fn session_lookup_delay(&self) -> Duration {
        Duration::from_millis(self.session_lookup_delay_ms)
    }
}
