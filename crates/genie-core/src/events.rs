//! Genie coordination events.
//!
//! The server announces every step of a coordination on its notification
//! channel as a named event with a JSON payload. This module turns that raw
//! pair into a closed set of typed events:
//!
//! - **[`EventKind`]**: every event name the tracker understands, including
//!   the display-only ("inert") kinds that never touch tracker state
//! - **[`GenieEvent`]**: one variant per state-changing payload family
//! - **[`Notification`]**: the raw `(event_type, payload)` frame as received
//!
//! Payload decoding never fails. Missing or wrong-typed fields decode as
//! absent (see [`crate::de`]), and a payload that is not a JSON object decodes
//! as the all-default payload.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::de::{opt_bool, opt_f64, opt_string, opt_tag, opt_u64, string_of, tag_list, tag_of};
use crate::ids::{ProfileTag, SessionId};

// ─────────────────────────────────────────────────────────────────────────────
// EventKind
// ─────────────────────────────────────────────────────────────────────────────

/// Every notification name emitted by a Genie coordination.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Coordination start, as announced by the chat pipeline.
    GenieStart,
    /// Coordination start, as announced by the router.
    GenieRouting,
    /// Coordination start, as announced by the coordinator itself.
    GenieCoordinationStart,
    /// The router picked the delegates to consult.
    GenieRoutingDecision,
    /// A delegate profile was invoked.
    GenieSlaveInvoked,
    /// A delegate reported progress.
    GenieSlaveProgress,
    /// A delegate finished (successfully or not).
    GenieSlaveCompleted,
    /// The Genie began combining delegate results.
    GenieSynthesisStart,
    /// Terminal event of a coordination.
    GenieCoordinationComplete,
    /// A raw LLM step of the Genie. Display-only.
    GenieLlmStep,
    /// Synthesis finished. Display-only; completion is signalled separately.
    GenieSynthesisComplete,
}

impl EventKind {
    /// All known kinds.
    pub const ALL: [Self; 11] = [
        Self::GenieStart,
        Self::GenieRouting,
        Self::GenieCoordinationStart,
        Self::GenieRoutingDecision,
        Self::GenieSlaveInvoked,
        Self::GenieSlaveProgress,
        Self::GenieSlaveCompleted,
        Self::GenieSynthesisStart,
        Self::GenieCoordinationComplete,
        Self::GenieLlmStep,
        Self::GenieSynthesisComplete,
    ];

    /// Wire name of this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GenieStart => "genie_start",
            Self::GenieRouting => "genie_routing",
            Self::GenieCoordinationStart => "genie_coordination_start",
            Self::GenieRoutingDecision => "genie_routing_decision",
            Self::GenieSlaveInvoked => "genie_slave_invoked",
            Self::GenieSlaveProgress => "genie_slave_progress",
            Self::GenieSlaveCompleted => "genie_slave_completed",
            Self::GenieSynthesisStart => "genie_synthesis_start",
            Self::GenieCoordinationComplete => "genie_coordination_complete",
            Self::GenieLlmStep => "genie_llm_step",
            Self::GenieSynthesisComplete => "genie_synthesis_complete",
        }
    }

    /// Parse a wire name. Returns `None` for names outside the Genie family.
    #[must_use]
    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }

    /// Whether this kind is consumed only by the display layer.
    #[must_use]
    pub fn is_inert(self) -> bool {
        matches!(self, Self::GenieLlmStep | Self::GenieSynthesisComplete)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Payloads
// ─────────────────────────────────────────────────────────────────────────────

/// A delegate profile offered at coordination start.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileDescriptor {
    /// Tag unique within the coordination.
    pub tag: ProfileTag,
    /// Display name.
    pub name: String,
    /// Backend profile ID.
    pub id: String,
}

impl ProfileDescriptor {
    /// Build a descriptor from its parts.
    pub fn new(tag: impl Into<ProfileTag>, name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            name: name.into(),
            id: id.into(),
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        if value.is_string() {
            let tag = tag_of(value)?;
            return Some(Self::new(tag.clone(), tag, ""));
        }
        let map = value.as_object()?;
        let tag = map.get("tag").and_then(tag_of)?;
        let name = map
            .get("name")
            .and_then(string_of)
            .unwrap_or_else(|| tag.clone());
        let id = map.get("id").and_then(string_of).unwrap_or_default();
        Some(Self::new(tag, name, id))
    }
}

/// Profile list field. Entries are `{tag, name, id}` objects or bare tag
/// strings; entries without a usable tag are skipped.
fn profile_list<'de, D>(deserializer: D) -> Result<Vec<ProfileDescriptor>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value
        .as_array()
        .map(|items| items.iter().filter_map(ProfileDescriptor::from_value).collect())
        .unwrap_or_default())
}

/// Payload of the three start kinds.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartPayload {
    /// Explicit coordination ID, when the server assigns one.
    #[serde(deserialize_with = "opt_string")]
    pub coordination_id: Option<String>,
    /// Session of the Genie (preferred over `session_id`).
    #[serde(deserialize_with = "opt_string")]
    pub genie_session_id: Option<SessionId>,
    /// Session the event belongs to.
    #[serde(deserialize_with = "opt_string")]
    pub session_id: Option<SessionId>,
    /// Candidate delegates.
    #[serde(deserialize_with = "profile_list")]
    pub slave_profiles: Vec<ProfileDescriptor>,
    /// Tag of the Genie profile itself.
    #[serde(deserialize_with = "opt_tag")]
    pub profile_tag: Option<ProfileTag>,
}

impl StartPayload {
    /// Session this start belongs to: `genie_session_id`, else `session_id`.
    #[must_use]
    pub fn session(&self) -> Option<&SessionId> {
        self.genie_session_id.as_ref().or(self.session_id.as_ref())
    }
}

/// Payload of `genie_routing_decision`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingDecisionPayload {
    /// Router's explanation.
    #[serde(deserialize_with = "opt_string")]
    pub decision_text: Option<String>,
    /// Delegates the router selected.
    #[serde(deserialize_with = "tag_list")]
    pub selected_profiles: Vec<ProfileTag>,
}

/// Payload of `genie_slave_invoked`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlaveInvokedPayload {
    /// Delegate tag.
    #[serde(deserialize_with = "opt_tag")]
    pub profile_tag: Option<ProfileTag>,
    /// Session created for the delegate.
    #[serde(deserialize_with = "opt_string")]
    pub slave_session_id: Option<SessionId>,
    /// Backend profile ID of the delegate.
    #[serde(deserialize_with = "opt_string")]
    pub profile_id: Option<String>,
    /// Display name, when the server includes one.
    #[serde(deserialize_with = "opt_string")]
    pub profile_name: Option<String>,
    /// Sub-query handed to the delegate.
    #[serde(deserialize_with = "opt_string")]
    pub query: Option<String>,
    /// Genie session that spawned the delegate.
    #[serde(deserialize_with = "opt_string")]
    pub parent_session_id: Option<SessionId>,
}

/// Payload of `genie_slave_progress`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlaveProgressPayload {
    /// Delegate tag.
    #[serde(deserialize_with = "opt_tag")]
    pub profile_tag: Option<ProfileTag>,
    /// Free-form phase (`"executing"` marks a freshly created delegate session).
    #[serde(deserialize_with = "opt_string")]
    pub status: Option<String>,
    /// Human-readable progress line.
    #[serde(deserialize_with = "opt_string")]
    pub message: Option<String>,
    /// Completion percentage.
    #[serde(deserialize_with = "opt_f64")]
    pub progress_pct: Option<f64>,
    /// Delegate session.
    #[serde(deserialize_with = "opt_string")]
    pub slave_session_id: Option<SessionId>,
}

/// Payload of `genie_slave_completed`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlaveCompletedPayload {
    /// Delegate tag.
    #[serde(deserialize_with = "opt_tag")]
    pub profile_tag: Option<ProfileTag>,
    /// Full result text.
    #[serde(deserialize_with = "opt_string")]
    pub result: Option<String>,
    /// Server-side preview of the result.
    #[serde(deserialize_with = "opt_string")]
    pub result_preview: Option<String>,
    /// Wall-clock duration of the delegate.
    #[serde(deserialize_with = "opt_u64")]
    pub duration_ms: Option<u64>,
    /// Success flag.
    #[serde(deserialize_with = "opt_bool")]
    pub success: Option<bool>,
    /// Error message on failure.
    #[serde(deserialize_with = "opt_string")]
    pub error: Option<String>,
}

/// Payload of `genie_synthesis_start`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisStartPayload {
    /// Delegates whose results feed the synthesis.
    #[serde(deserialize_with = "tag_list")]
    pub profiles_consulted: Vec<ProfileTag>,
}

/// Payload of `genie_coordination_complete`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinationCompletePayload {
    /// Wall-clock duration of the whole coordination.
    #[serde(deserialize_with = "opt_u64")]
    pub total_duration_ms: Option<u64>,
    /// Delegates that contributed.
    #[serde(deserialize_with = "tag_list")]
    pub profiles_used: Vec<ProfileTag>,
    /// Success flag.
    #[serde(deserialize_with = "opt_bool")]
    pub success: Option<bool>,
    /// Error message on failure.
    #[serde(deserialize_with = "opt_string")]
    pub error: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// GenieEvent
// ─────────────────────────────────────────────────────────────────────────────

/// A decoded coordination event.
#[derive(Clone, Debug, PartialEq)]
pub enum GenieEvent {
    /// One of the three start kinds.
    Start {
        /// Which start kind was received.
        kind: EventKind,
        /// Start payload.
        payload: StartPayload,
    },
    /// Router decision.
    RoutingDecision(RoutingDecisionPayload),
    /// Delegate invoked.
    SlaveInvoked(SlaveInvokedPayload),
    /// Delegate progress.
    SlaveProgress(SlaveProgressPayload),
    /// Delegate finished.
    SlaveCompleted(SlaveCompletedPayload),
    /// Synthesis began.
    SynthesisStart(SynthesisStartPayload),
    /// Coordination finished.
    CoordinationComplete(CoordinationCompletePayload),
    /// Display-only kind.
    Inert(EventKind),
}

impl GenieEvent {
    /// Decode a payload for a known kind.
    #[must_use]
    pub fn decode(kind: EventKind, payload: Value) -> Self {
        match kind {
            EventKind::GenieStart | EventKind::GenieRouting | EventKind::GenieCoordinationStart => {
                Self::Start {
                    kind,
                    payload: decode_payload(kind, payload),
                }
            }
            EventKind::GenieRoutingDecision => Self::RoutingDecision(decode_payload(kind, payload)),
            EventKind::GenieSlaveInvoked => Self::SlaveInvoked(decode_payload(kind, payload)),
            EventKind::GenieSlaveProgress => Self::SlaveProgress(decode_payload(kind, payload)),
            EventKind::GenieSlaveCompleted => Self::SlaveCompleted(decode_payload(kind, payload)),
            EventKind::GenieSynthesisStart => Self::SynthesisStart(decode_payload(kind, payload)),
            EventKind::GenieCoordinationComplete => {
                Self::CoordinationComplete(decode_payload(kind, payload))
            }
            EventKind::GenieLlmStep | EventKind::GenieSynthesisComplete => Self::Inert(kind),
        }
    }

    /// Kind of this event.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Start { kind, .. } | Self::Inert(kind) => *kind,
            Self::RoutingDecision(_) => EventKind::GenieRoutingDecision,
            Self::SlaveInvoked(_) => EventKind::GenieSlaveInvoked,
            Self::SlaveProgress(_) => EventKind::GenieSlaveProgress,
            Self::SlaveCompleted(_) => EventKind::GenieSlaveCompleted,
            Self::SynthesisStart(_) => EventKind::GenieSynthesisStart,
            Self::CoordinationComplete(_) => EventKind::GenieCoordinationComplete,
        }
    }
}

fn decode_payload<T: DeserializeOwned + Default>(kind: EventKind, payload: Value) -> T {
    if !payload.is_object() {
        return T::default();
    }
    serde_json::from_value(payload).unwrap_or_else(|e| {
        warn!(event_type = %kind, error = %e, "malformed payload, using defaults");
        T::default()
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Notification
// ─────────────────────────────────────────────────────────────────────────────

/// Raw notification frame as delivered by the channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Event name.
    #[serde(rename = "type", alias = "event_type", alias = "event")]
    pub event_type: String,
    /// Event payload.
    #[serde(default)]
    pub payload: Value,
}

impl Notification {
    /// Build a notification from its parts.
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
        }
    }

    /// Kind of this notification, if it belongs to the Genie family.
    #[must_use]
    pub fn kind(&self) -> Option<EventKind> {
        EventKind::from_wire(&self.event_type)
    }

    /// Decode into a typed event. `None` for names outside the Genie family.
    #[must_use]
    pub fn decode(&self) -> Option<GenieEvent> {
        self.kind()
            .map(|kind| GenieEvent::decode(kind, self.payload.clone()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
