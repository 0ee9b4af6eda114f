//! Projected coordination state.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use genie_core::events::ProfileDescriptor;
use genie_core::ids::{CoordinationId, ProfileTag, SessionId};
use serde::{Deserialize, Serialize};

/// Lifecycle of one delegate within a coordination.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlaveStatus {
    /// Offered at start, not invoked yet.
    #[default]
    Pending,
    /// Invoked and running.
    Active,
    /// Finished successfully.
    Completed,
    /// Finished with a failure.
    Error,
}

impl SlaveStatus {
    /// Wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    /// Whether the delegate has finished, either way.
    #[must_use]
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

impl fmt::Display for SlaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-delegate tracking record.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlaveRecord {
    /// Current status.
    pub status: SlaveStatus,
    /// Display name.
    pub name: String,
    /// Backend profile ID.
    pub id: String,
    /// Delegate session, once invoked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// When the delegate was invoked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    /// Reported run time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Latest progress message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Latest progress percentage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_pct: Option<f64>,
    /// Full result, or a bounded preview of it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Failure description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Sub-query the delegate was asked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

impl SlaveRecord {
    /// Pending record for a profile offered at start.
    #[must_use]
    pub fn pending(profile: &ProfileDescriptor) -> Self {
        Self {
            name: profile.name.clone(),
            id: profile.id.clone(),
            ..Self::default()
        }
    }
}

/// Everything known about the coordination in progress.
///
/// The default value is the idle state.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinationState {
    /// Coordination in progress, `None` when idle.
    pub active_coordination_id: Option<CoordinationId>,
    /// Session the coordination belongs to.
    pub genie_session_id: Option<SessionId>,
    /// Tag of the coordinating profile.
    pub genie_profile_tag: Option<ProfileTag>,
    /// Per-delegate records keyed by tag.
    pub slave_progress: BTreeMap<ProfileTag, SlaveRecord>,
    /// When the coordination began.
    pub start_time: Option<DateTime<Utc>>,
    /// Delegates offered at start, in announced order.
    pub available_profiles: Vec<ProfileDescriptor>,
    /// Tags actually invoked, in invocation order, without duplicates.
    pub profiles_invoked: Vec<ProfileTag>,
    /// Router's explanation of its choice.
    pub routing_decision: Option<String>,
    /// Delegates chosen by the router.
    pub selected_profiles: Vec<ProfileTag>,
    /// Whether synthesis began.
    pub synthesis_started: bool,
    /// Delegates whose results feed the synthesis.
    pub profiles_consulted: Vec<ProfileTag>,
}

impl CoordinationState {
    /// Whether a coordination is in progress.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active_coordination_id.is_some()
    }

    /// Milliseconds since start, measured at `now`. Zero when idle.
    #[must_use]
    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> u64 {
        self.start_time.map_or(0, |start| {
            u64::try_from((now - start).num_milliseconds()).unwrap_or(0)
        })
    }

    /// Delegate tags in display order: announced profiles first, then ad hoc
    /// tags in invocation order, then anything else.
    #[must_use]
    pub fn ordered_tags(&self) -> Vec<&ProfileTag> {
        let mut tags: Vec<&ProfileTag> = Vec::with_capacity(self.slave_progress.len());
        let announced = self.available_profiles.iter().map(|p| &p.tag);
        for tag in announced.chain(self.profiles_invoked.iter()) {
            if self.slave_progress.contains_key(tag) && !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        for tag in self.slave_progress.keys() {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        tags
    }

    /// Count of delegates per status, in status order.
    #[must_use]
    pub fn status_counts(&self) -> [(SlaveStatus, usize); 4] {
        let count = |status| {
            self.slave_progress
                .values()
                .filter(|r| r.status == status)
                .count()
        };
        [
            (SlaveStatus::Pending, count(SlaveStatus::Pending)),
            (SlaveStatus::Active, count(SlaveStatus::Active)),
            (SlaveStatus::Completed, count(SlaveStatus::Completed)),
            (SlaveStatus::Error, count(SlaveStatus::Error)),
        ]
    }
}

/// Detached copy of the state plus derived fields.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinationSnapshot {
    /// Copied state.
    #[serde(flatten)]
    pub state: CoordinationState,
    /// Milliseconds since start at the time of the snapshot.
    pub elapsed_ms: u64,
    /// Whether the coordination counted as active when the snapshot was taken.
    pub is_active: bool,
}

impl CoordinationSnapshot {
    /// Snapshot `state` as of `now`.
    #[must_use]
    pub fn capture(state: &CoordinationState, now: DateTime<Utc>) -> Self {
        Self {
            state: state.clone(),
            elapsed_ms: state.elapsed_ms(now),
            is_active: state.is_active(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
