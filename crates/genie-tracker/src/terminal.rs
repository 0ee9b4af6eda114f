//! Terminal snapshot of a finished coordination.
//!
//! Finishing a coordination resets the tracker immediately, but a consumer
//! still has to draw the final state. The tracker therefore hands out a
//! [`TerminalSnapshot`] taken just before the reset and remains
//! display-active until the consumer acknowledges it.

use genie_core::events::CoordinationCompletePayload;
use genie_core::ids::{CoordinationId, ProfileTag};
use serde::Serialize;

use crate::state::CoordinationSnapshot;

/// Completion telemetry recorded for external logging.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionTelemetry {
    /// Finished coordination.
    pub coordination_id: CoordinationId,
    /// Reported duration, else the tracker's own elapsed time.
    pub total_duration_ms: u64,
    /// Reported outcome, else "no error supplied".
    pub success: bool,
    /// Reported profiles, else the profiles invoked.
    pub profiles_used: Vec<ProfileTag>,
    /// Reported failure description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CompletionTelemetry {
    /// Combine the completion payload with what the tracker observed.
    #[must_use]
    pub fn from_payload(
        payload: &CoordinationCompletePayload,
        snapshot: &CoordinationSnapshot,
        coordination_id: CoordinationId,
    ) -> Self {
        let profiles_used = if payload.profiles_used.is_empty() {
            snapshot.state.profiles_invoked.clone()
        } else {
            payload.profiles_used.clone()
        };
        Self {
            coordination_id,
            total_duration_ms: payload.total_duration_ms.unwrap_or(snapshot.elapsed_ms),
            success: payload.success.unwrap_or(payload.error.is_none()),
            profiles_used,
            error: payload.error.clone(),
        }
    }
}

/// Final view of a coordination, pending acknowledgement by its consumer.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalSnapshot {
    /// Finished coordination.
    pub coordination_id: CoordinationId,
    /// State just before the reset; still reports `is_active`.
    pub final_state: CoordinationSnapshot,
    /// Completion telemetry.
    pub telemetry: CompletionTelemetry,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
