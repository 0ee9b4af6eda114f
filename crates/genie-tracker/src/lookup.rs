//! Delegate session discovery.
//!
//! When a delegate starts executing, its session exists on the server but may
//! not be listed yet. The tracker waits a short delay, then makes a single
//! listing call and surfaces the session if it shows up. The lookup is never
//! retried.
//!
//! Each lookup is tied to the coordination it was issued for. Both the wait
//! and the call race that coordination's [`CancellationToken`], and the result
//! is discarded unless the shared active-coordination cell still names the
//! same coordination.

use std::sync::Arc;
use std::time::Duration;

use genie_core::errors::DirectoryError;
use genie_core::ids::{CoordinationId, ProfileTag, SessionId};
use genie_core::sessions::{SessionDirectory, SessionSummary};
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::effects::CoordinationEffects;

/// Coordination currently tracked, shared with detached lookups.
pub(crate) type ActiveCell = Arc<RwLock<Option<CoordinationId>>>;

/// How a lookup ended.
#[derive(Clone, Debug, PartialEq)]
pub enum LookupOutcome {
    /// The session was listed and handed to the effects.
    Surfaced(SessionSummary),
    /// The listing (or the session in it) is not visible yet.
    NotVisible,
    /// The listing call failed.
    Failed(DirectoryError),
    /// The coordination moved on before the result arrived.
    Stale,
    /// The coordination was reset while the lookup was pending.
    Cancelled,
}

/// Everything a detached lookup needs.
pub(crate) struct LookupRequest {
    pub coordination_id: CoordinationId,
    pub session_id: SessionId,
    pub profile_tag: ProfileTag,
    pub delay: Duration,
    pub limit: u32,
    pub offset: u32,
}

/// Wait, list once, and surface the session if it is listed.
pub(crate) async fn run_lookup(
    request: LookupRequest,
    directory: Arc<dyn SessionDirectory>,
    effects: Arc<dyn CoordinationEffects>,
    active: ActiveCell,
    cancel: CancellationToken,
) -> LookupOutcome {
    let LookupRequest {
        coordination_id,
        session_id,
        profile_tag,
        delay,
        limit,
        offset,
    } = request;

    tokio::select! {
        biased;
        () = cancel.cancelled() => return LookupOutcome::Cancelled,
        () = tokio::time::sleep(delay) => {}
    }

    let result = tokio::select! {
        biased;
        () = cancel.cancelled() => return LookupOutcome::Cancelled,
        result = directory.list_sessions(limit, offset) => result,
    };

    // Held until the effect has run so a concurrent reset waits for it.
    let current = active.read();
    if current.as_ref() != Some(&coordination_id) || cancel.is_cancelled() {
        debug!(
            coordination_id = %coordination_id,
            session_id = %session_id,
            "coordination moved on, discarding session lookup"
        );
        return LookupOutcome::Stale;
    }

    match result {
        Ok(sessions) => match sessions.into_iter().find(|s| s.id == session_id) {
            Some(summary) => {
                debug!(
                    coordination_id = %coordination_id,
                    profile_tag = %profile_tag,
                    session_id = %session_id,
                    "delegate session discovered"
                );
                effects.delegate_session_discovered(&coordination_id, &summary);
                LookupOutcome::Surfaced(summary)
            }
            None => {
                debug!(
                    session_id = %session_id,
                    limit,
                    offset,
                    "delegate session not listed yet"
                );
                LookupOutcome::NotVisible
            }
        },
        Err(e) if e.is_not_found() => {
            debug!(session_id = %session_id, "session listing not found");
            LookupOutcome::NotVisible
        }
        Err(e) => {
            debug!(
                session_id = %session_id,
                error_kind = e.error_kind(),
                error = %e,
                "session lookup failed"
            );
            LookupOutcome::Failed(e)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
