//! Console-side coordination effects.

use std::collections::HashSet;

use genie_core::ids::CoordinationId;
use genie_core::sessions::SessionSummary;
use genie_tracker::{CompletionTelemetry, CoordinationEffects};
use parking_lot::Mutex;
use tracing::{debug, info};

/// Keeps the companion session list and the keep-expanded set of the console.
#[derive(Default)]
pub struct ConsoleEffects {
    companions: Mutex<Vec<SessionSummary>>,
    kept_expanded: Mutex<HashSet<CoordinationId>>,
    last_telemetry: Mutex<Option<CompletionTelemetry>>,
}

impl ConsoleEffects {
    /// Delegate sessions discovered so far, in discovery order.
    pub fn companions(&self) -> Vec<SessionSummary> {
        self.companions.lock().clone()
    }

    /// Whether a finished coordination was marked keep-expanded.
    pub fn is_kept_expanded(&self, coordination_id: &CoordinationId) -> bool {
        self.kept_expanded.lock().contains(coordination_id)
    }

    /// Telemetry of the most recent completion.
    pub fn last_telemetry(&self) -> Option<CompletionTelemetry> {
        self.last_telemetry.lock().clone()
    }
}

impl CoordinationEffects for ConsoleEffects {
    fn expand_coordination(&self, coordination_id: &CoordinationId) {
        debug!(coordination_id = %coordination_id, "expanding coordination group");
    }

    fn keep_expanded(&self, coordination_id: &CoordinationId) {
        let _ = self.kept_expanded.lock().insert(coordination_id.clone());
    }

    fn coordination_finished(&self, telemetry: &CompletionTelemetry) {
        *self.last_telemetry.lock() = Some(telemetry.clone());
    }

    fn delegate_session_discovered(&self, coordination_id: &CoordinationId, session: &SessionSummary) {
        let mut companions = self.companions.lock();
        if companions.iter().any(|s| s.id == session.id) {
            return;
        }
        companions.push(session.clone());
        info!(
            coordination_id = %coordination_id,
            session_id = %session.id,
            name = session.display_name(),
            "delegate session available"
        );
    }
}
