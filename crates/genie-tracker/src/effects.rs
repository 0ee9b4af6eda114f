//! Cosmetic side effects of coordination tracking.
//!
//! The tracker never renders anything itself. Whatever a display wants to do
//! in reaction to a coordination (expand its group, keep it expanded after
//! completion, list a newly discovered delegate session) goes through
//! [`CoordinationEffects`]. Every method defaults to a no-op.

use genie_core::ids::CoordinationId;
use genie_core::sessions::SessionSummary;

use crate::terminal::CompletionTelemetry;

/// Display-side hooks invoked by the tracker.
///
/// Called from the dispatch path and from detached tasks, so implementations
/// must be cheap and must not block.
pub trait CoordinationEffects: Send + Sync {
    /// Expand the display group of a coordination that just started.
    fn expand_coordination(&self, _coordination_id: &CoordinationId) {}

    /// Keep the group of a finished coordination expanded.
    fn keep_expanded(&self, _coordination_id: &CoordinationId) {}

    /// Record completion telemetry.
    fn coordination_finished(&self, _telemetry: &CompletionTelemetry) {}

    /// A delegate session became visible in the session listing.
    fn delegate_session_discovered(
        &self,
        _coordination_id: &CoordinationId,
        _session: &SessionSummary,
    ) {
    }
}

/// Effects that do nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopEffects;

impl CoordinationEffects for NoopEffects {}
