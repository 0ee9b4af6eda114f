//! The coordination tracker.
//!
//! Owns one [`CoordinationState`] and mutates it synchronously in response to
//! coordination events. Only cosmetic work is deferred: the start-time group
//! expansion and the delegate session lookup run as detached Tokio tasks, and
//! both are skipped (with a debug log) when no runtime is available.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use genie_core::events::{
    CoordinationCompletePayload, EventKind, GenieEvent, Notification, RoutingDecisionPayload,
    SlaveCompletedPayload, SlaveInvokedPayload, SlaveProgressPayload, StartPayload,
    SynthesisStartPayload,
};
use genie_core::ids::{CoordinationId, ProfileTag, SessionId};
use genie_core::sessions::SessionDirectory;
use genie_core::text::preview;
use genie_settings::TrackerSettings;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dispatch::{DispatchOutcome, IgnoreReason, Update};
use crate::effects::CoordinationEffects;
use crate::lookup::{ActiveCell, LookupOutcome, LookupRequest, run_lookup};
use crate::state::{CoordinationSnapshot, CoordinationState, SlaveRecord, SlaveStatus};
use crate::terminal::{CompletionTelemetry, TerminalSnapshot};

/// Progress status that triggers the delegate session lookup.
const EXECUTING_STATUS: &str = "executing";

/// Timing and limits of the tracker's deferred work.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Delay between a start and the group expansion.
    pub expand_delay: Duration,
    /// Delay before a delegate session lookup.
    pub session_lookup_delay: Duration,
    /// Page size of the lookup.
    pub session_lookup_limit: u32,
    /// Page offset of the lookup.
    pub session_lookup_offset: u32,
    /// Bound on stored result text when only a preview is reported.
    pub result_preview_chars: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::from(&TrackerSettings::default())
    }
}

impl From<&TrackerSettings> for TrackerConfig {
    fn from(settings: &TrackerSettings) -> Self {
        Self {
            expand_delay: settings.expand_delay(),
            session_lookup_delay: settings.session_lookup_delay(),
            session_lookup_limit: settings.session_lookup_limit,
            session_lookup_offset: settings.session_lookup_offset,
            result_preview_chars: settings.result_preview_chars,
        }
    }
}

/// Mirror of one server-driven coordination at a time.
pub struct CoordinationTracker {
    config: TrackerConfig,
    effects: Arc<dyn CoordinationEffects>,
    directory: Option<Arc<dyn SessionDirectory>>,
    state: CoordinationState,
    current_session: Option<SessionId>,
    active: ActiveCell,
    cancel: CancellationToken,
    looked_up: HashSet<SessionId>,
    lookups: Vec<JoinHandle<LookupOutcome>>,
    pending_terminal: Option<CoordinationId>,
    deferred_enabled: bool,
}

impl CoordinationTracker {
    /// Create an idle tracker.
    ///
    /// Without a `directory`, delegate session lookups are never scheduled.
    pub fn new(
        config: TrackerConfig,
        effects: Arc<dyn CoordinationEffects>,
        directory: Option<Arc<dyn SessionDirectory>>,
    ) -> Self {
        Self {
            config,
            effects,
            directory,
            state: CoordinationState::default(),
            current_session: None,
            active: Arc::new(RwLock::new(None)),
            cancel: CancellationToken::new(),
            looked_up: HashSet::new(),
            lookups: Vec::new(),
            pending_terminal: None,
            deferred_enabled: true,
        }
    }

    // ── Queries ─────────────────────────────────────────────────────────

    /// Whether a coordination is in progress.
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Whether a finished coordination still awaits acknowledgement.
    pub fn awaiting_acknowledgement(&self) -> bool {
        self.pending_terminal.is_some()
    }

    /// Whether a display should still draw a coordination: it is running, or
    /// its terminal snapshot has not been acknowledged yet.
    pub fn is_display_active(&self) -> bool {
        self.is_active() || self.awaiting_acknowledgement()
    }

    /// Neither running nor awaiting acknowledgement.
    pub fn is_idle(&self) -> bool {
        !self.is_display_active()
    }

    /// Detached copy of the state with elapsed time.
    pub fn snapshot(&self) -> CoordinationSnapshot {
        CoordinationSnapshot::capture(&self.state, Utc::now())
    }

    /// Borrow the live state.
    pub fn state(&self) -> &CoordinationState {
        &self.state
    }

    /// Tracker configuration.
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Session currently displayed by the consumer.
    pub fn current_session(&self) -> Option<&SessionId> {
        self.current_session.as_ref()
    }

    /// Set the session the consumer displays. Starts for other sessions are
    /// ignored; `None` accepts every start.
    pub fn set_current_session(&mut self, session: Option<SessionId>) {
        self.current_session = session;
    }

    // ── Dispatch ────────────────────────────────────────────────────────

    /// Route a decoded event to its operation.
    pub fn handle(&mut self, event: GenieEvent) -> DispatchOutcome {
        let kind = event.kind();
        let outcome = match event {
            GenieEvent::Start { payload, .. } => {
                DispatchOutcome::from_update(kind, self.start(&payload))
            }
            GenieEvent::RoutingDecision(payload) => {
                DispatchOutcome::from_update(kind, self.record_routing_decision(&payload))
            }
            GenieEvent::SlaveInvoked(payload) => {
                DispatchOutcome::from_update(kind, self.record_invocation(&payload))
            }
            GenieEvent::SlaveProgress(payload) => {
                DispatchOutcome::from_update(kind, self.record_progress(&payload))
            }
            GenieEvent::SlaveCompleted(payload) => {
                DispatchOutcome::from_update(kind, self.record_completion(&payload))
            }
            GenieEvent::SynthesisStart(payload) => {
                DispatchOutcome::from_update(kind, self.record_synthesis_start(&payload))
            }
            GenieEvent::CoordinationComplete(payload) => match self.finish(&payload) {
                Some(terminal) => DispatchOutcome::Terminal(Box::new(terminal)),
                None => DispatchOutcome::Ignored(kind, IgnoreReason::Idle),
            },
            GenieEvent::Inert(kind) => DispatchOutcome::Inert(kind),
        };

        if let DispatchOutcome::Ignored(kind, reason) = &outcome {
            debug!(event_type = %kind, reason = %reason, "event ignored");
        }
        outcome
    }

    /// Decode and route a raw notification.
    pub fn handle_notification(&mut self, notification: &Notification) -> DispatchOutcome {
        match notification.decode() {
            Some(event) => self.handle(event),
            None => {
                warn!(event_type = %notification.event_type, "unknown event type, dropping");
                DispatchOutcome::Unknown(notification.event_type.clone())
            }
        }
    }

    /// Decode and route a raw `(event_type, payload)` pair.
    pub fn handle_raw(&mut self, event_type: &str, payload: Value) -> DispatchOutcome {
        match EventKind::from_wire(event_type) {
            Some(kind) => self.handle(GenieEvent::decode(kind, payload)),
            None => {
                warn!(event_type, "unknown event type, dropping");
                DispatchOutcome::Unknown(event_type.to_string())
            }
        }
    }

    /// Feed a session-scoped history through the tracker with effects and
    /// lookups suppressed. Returns the last terminal snapshot seen.
    pub fn replay<I>(&mut self, history: I) -> Option<TerminalSnapshot>
    where
        I: IntoIterator<Item = Notification>,
    {
        let previous = std::mem::replace(&mut self.deferred_enabled, false);
        let mut last_terminal = None;
        let mut count = 0usize;
        for notification in history {
            count += 1;
            if let Some(terminal) = self.handle_notification(&notification).into_terminal() {
                last_terminal = Some(terminal);
            }
        }
        self.deferred_enabled = previous;
        debug!(
            events = count,
            active = self.is_active(),
            terminal = last_terminal.is_some(),
            "history replayed"
        );
        last_terminal
    }

    // ── Operations ──────────────────────────────────────────────────────

    /// Begin tracking a coordination, superseding any active one.
    pub fn start(&mut self, payload: &StartPayload) -> Update {
        if let (Some(session), Some(current)) = (payload.session(), &self.current_session) {
            if session != current {
                debug!(
                    session_id = %session,
                    current_session_id = %current,
                    "start for another session, ignoring"
                );
                return Update::Ignored(IgnoreReason::SessionMismatch);
            }
        }

        if let Some(previous) = &self.state.active_coordination_id {
            warn!(
                coordination_id = %previous,
                "new coordination started while one was active, discarding previous"
            );
            self.reset();
        }
        if let Some(unacknowledged) = self.pending_terminal.take() {
            debug!(coordination_id = %unacknowledged, "terminal snapshot superseded");
        }

        let coordination_id = payload
            .coordination_id
            .as_deref()
            .map_or_else(CoordinationId::new, CoordinationId::from_raw);

        self.cancel = CancellationToken::new();
        self.looked_up.clear();
        self.state = CoordinationState {
            active_coordination_id: Some(coordination_id.clone()),
            genie_session_id: payload.session().cloned(),
            genie_profile_tag: payload.profile_tag.clone(),
            start_time: Some(Utc::now()),
            available_profiles: payload.slave_profiles.clone(),
            ..CoordinationState::default()
        };
        for profile in &payload.slave_profiles {
            let _ = self
                .state
                .slave_progress
                .entry(profile.tag.clone())
                .or_insert_with(|| SlaveRecord::pending(profile));
        }
        *self.active.write() = Some(coordination_id.clone());

        info!(
            coordination_id = %coordination_id,
            profiles = payload.slave_profiles.len(),
            "coordination started"
        );
        self.schedule_expand(coordination_id);
        Update::Applied
    }

    /// Store the router's choice of delegates.
    pub fn record_routing_decision(&mut self, payload: &RoutingDecisionPayload) -> Update {
        if !self.is_active() {
            return Update::Ignored(IgnoreReason::Idle);
        }
        self.state.routing_decision.clone_from(&payload.decision_text);
        self.state.selected_profiles.clone_from(&payload.selected_profiles);
        Update::Applied
    }

    /// Mark a delegate as invoked, creating its record if it was never
    /// announced.
    pub fn record_invocation(&mut self, payload: &SlaveInvokedPayload) -> Update {
        if !self.is_active() {
            return Update::Ignored(IgnoreReason::Idle);
        }
        let Some(tag) = &payload.profile_tag else {
            return Update::Ignored(IgnoreReason::UnknownTag);
        };

        let record = self
            .state
            .slave_progress
            .entry(tag.clone())
            .or_insert_with(|| {
                debug!(profile_tag = %tag, "invocation of unannounced profile");
                SlaveRecord {
                    name: payload
                        .profile_name
                        .clone()
                        .unwrap_or_else(|| tag.to_string()),
                    id: payload.profile_id.clone().unwrap_or_default(),
                    ..SlaveRecord::default()
                }
            });
        record.status = SlaveStatus::Active;
        record.start_time = Some(Utc::now());
        if payload.slave_session_id.is_some() {
            record.session_id.clone_from(&payload.slave_session_id);
        }
        if payload.query.is_some() {
            record.query.clone_from(&payload.query);
        }

        if !self.state.profiles_invoked.contains(tag) {
            self.state.profiles_invoked.push(tag.clone());
        }
        debug!(
            profile_tag = %tag,
            session_id = ?payload.slave_session_id,
            "delegate invoked"
        );
        Update::Applied
    }

    /// Update a known delegate's progress; may schedule a session lookup.
    pub fn record_progress(&mut self, payload: &SlaveProgressPayload) -> Update {
        if !self.is_active() {
            return Update::Ignored(IgnoreReason::Idle);
        }
        let Some(record) = payload
            .profile_tag
            .as_ref()
            .and_then(|tag| self.state.slave_progress.get_mut(tag))
        else {
            return Update::Ignored(IgnoreReason::UnknownTag);
        };

        if payload.message.is_some() {
            record.message.clone_from(&payload.message);
        }
        if payload.progress_pct.is_some() {
            record.progress_pct = payload.progress_pct;
        }
        if record.session_id.is_none() {
            record.session_id.clone_from(&payload.slave_session_id);
        }

        let executing = payload.status.as_deref() == Some(EXECUTING_STATUS);
        let session = payload
            .slave_session_id
            .clone()
            .or_else(|| record.session_id.clone());
        if let (true, Some(session), Some(tag)) = (executing, session, &payload.profile_tag) {
            let tag = tag.clone();
            self.schedule_lookup(tag, session);
        }
        Update::Applied
    }

    /// Record a delegate's result.
    pub fn record_completion(&mut self, payload: &SlaveCompletedPayload) -> Update {
        if !self.is_active() {
            return Update::Ignored(IgnoreReason::Idle);
        }
        let preview_chars = self.config.result_preview_chars;
        let Some(record) = payload
            .profile_tag
            .as_ref()
            .and_then(|tag| self.state.slave_progress.get_mut(tag))
        else {
            return Update::Ignored(IgnoreReason::UnknownTag);
        };

        let success = payload.success.unwrap_or(payload.error.is_none());
        record.status = if success {
            SlaveStatus::Completed
        } else {
            SlaveStatus::Error
        };
        if payload.duration_ms.is_some() {
            record.duration_ms = payload.duration_ms;
        }
        record.result = payload
            .result
            .clone()
            .or_else(|| payload.result_preview.as_deref().map(|p| preview(p, preview_chars)));
        record.error = if success { None } else { payload.error.clone() };

        debug!(
            profile_tag = ?payload.profile_tag,
            status = %record.status,
            duration_ms = ?record.duration_ms,
            "delegate completed"
        );
        Update::Applied
    }

    /// Note that synthesis began.
    pub fn record_synthesis_start(&mut self, payload: &SynthesisStartPayload) -> Update {
        if !self.is_active() {
            return Update::Ignored(IgnoreReason::Idle);
        }
        self.state.synthesis_started = true;
        self.state
            .profiles_consulted
            .clone_from(&payload.profiles_consulted);
        Update::Applied
    }

    /// Terminal transition. Records telemetry, resets the state, and returns
    /// the final snapshot. The tracker stays display-active until
    /// [`acknowledge`](Self::acknowledge) is called with its ID.
    ///
    /// Returns `None` when idle.
    pub fn finish(&mut self, payload: &CoordinationCompletePayload) -> Option<TerminalSnapshot> {
        let coordination_id = self.state.active_coordination_id.clone()?;
        let final_state = self.snapshot();
        let telemetry =
            CompletionTelemetry::from_payload(payload, &final_state, coordination_id.clone());

        info!(
            coordination_id = %coordination_id,
            total_duration_ms = telemetry.total_duration_ms,
            success = telemetry.success,
            profiles_used = telemetry.profiles_used.len(),
            error = ?telemetry.error,
            "coordination complete"
        );
        if self.deferred_enabled {
            self.effects.coordination_finished(&telemetry);
            self.effects.keep_expanded(&coordination_id);
        }

        self.reset();
        self.pending_terminal = Some(coordination_id.clone());
        Some(TerminalSnapshot {
            coordination_id,
            final_state,
            telemetry,
        })
    }

    /// Acknowledge a terminal snapshot. Returns `false` if `coordination_id`
    /// is not the one awaiting acknowledgement.
    pub fn acknowledge(&mut self, coordination_id: &CoordinationId) -> bool {
        if self.pending_terminal.as_ref() == Some(coordination_id) {
            self.pending_terminal = None;
            true
        } else {
            debug!(coordination_id = %coordination_id, "acknowledgement for unknown terminal");
            false
        }
    }

    /// Take the handles of every lookup scheduled so far.
    pub fn drain_lookups(&mut self) -> Vec<JoinHandle<LookupOutcome>> {
        std::mem::take(&mut self.lookups)
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn reset(&mut self) {
        self.cancel.cancel();
        *self.active.write() = None;
        self.state = CoordinationState::default();
        self.looked_up.clear();
    }

    fn schedule_expand(&self, coordination_id: CoordinationId) {
        if !self.deferred_enabled {
            return;
        }
        let Ok(runtime) = Handle::try_current() else {
            debug!(coordination_id = %coordination_id, "no async runtime, skipping expand");
            return;
        };
        let effects = Arc::clone(&self.effects);
        let delay = self.config.expand_delay;
        drop(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            effects.expand_coordination(&coordination_id);
        }));
    }

    fn schedule_lookup(&mut self, profile_tag: ProfileTag, session_id: SessionId) {
        if !self.deferred_enabled {
            return;
        }
        let (Some(directory), Some(coordination_id)) =
            (&self.directory, &self.state.active_coordination_id)
        else {
            return;
        };
        if self.looked_up.contains(&session_id) {
            return;
        }
        let Ok(runtime) = Handle::try_current() else {
            debug!(session_id = %session_id, "no async runtime, skipping session lookup");
            return;
        };
        let _ = self.looked_up.insert(session_id.clone());

        debug!(
            coordination_id = %coordination_id,
            profile_tag = %profile_tag,
            session_id = %session_id,
            "scheduling delegate session lookup"
        );
        let request = LookupRequest {
            coordination_id: coordination_id.clone(),
            session_id,
            profile_tag,
            delay: self.config.session_lookup_delay,
            limit: self.config.session_lookup_limit,
            offset: self.config.session_lookup_offset,
        };
        let handle = runtime.spawn(run_lookup(
            request,
            Arc::clone(directory),
            Arc::clone(&self.effects),
            Arc::clone(&self.active),
            self.cancel.clone(),
        ));
        self.lookups.retain(|h| !h.is_finished());
        self.lookups.push(handle);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use genie_core::events::ProfileDescriptor;
    use genie_core::logging::capture_logs;
    use serde_json::json;
    use tracing::Level;

    fn tracker() -> CoordinationTracker {
        CoordinationTracker::new(
            TrackerConfig::default(),
            Arc::new(crate::effects::NoopEffects),
            None,
        )
    }

    fn start_payload(tags: &[&str]) -> StartPayload {
        StartPayload {
            coordination_id: Some("coord_test".into()),
            session_id: Some("sess_main".into()),
            slave_profiles: tags
                .iter()
                .map(|t| ProfileDescriptor::new(*t, format!("{t} profile"), "id"))
                .collect(),
            ..StartPayload::default()
        }
    }

    fn invoked(tag: &str) -> SlaveInvokedPayload {
        SlaveInvokedPayload {
            profile_tag: Some(tag.into()),
            slave_session_id: Some(format!("sess_{tag}").into()),
            query: Some("q".into()),
            ..SlaveInvokedPayload::default()
        }
    }

    // ── start ───────────────────────────────────────────────────────────

    #[test]
    fn start_seeds_pending_records() {
        let mut t = tracker();
        assert_eq!(t.start(&start_payload(&["A", "B"])), Update::Applied);

        let s = t.state();
        assert_eq!(s.active_coordination_id.as_ref().unwrap().as_str(), "coord_test");
        assert_eq!(s.genie_session_id.as_ref().unwrap().as_str(), "sess_main");
        assert_eq!(s.slave_progress.len(), 2);
        assert!(s.slave_progress.values().all(|r| r.status == SlaveStatus::Pending));
        assert!(s.start_time.is_some());
        assert!(s.profiles_invoked.is_empty());
    }

    #[test]
    fn start_without_id_generates_one() {
        let mut t = tracker();
        let _ = t.start(&StartPayload::default());
        let id = t.state().active_coordination_id.clone().unwrap();
        assert!(id.as_str().starts_with("coord_"));
    }

    #[test]
    fn start_prefers_genie_session_id() {
        let mut t = tracker();
        t.set_current_session(Some("sess_genie".into()));
        let payload = StartPayload {
            genie_session_id: Some("sess_genie".into()),
            session_id: Some("sess_other".into()),
            ..StartPayload::default()
        };
        assert_eq!(t.start(&payload), Update::Applied);
    }

    #[test]
    fn start_for_other_session_ignored() {
        let mut t = tracker();
        t.set_current_session(Some("sess_mine".into()));
        let before = t.state().clone();
        assert_eq!(
            t.start(&start_payload(&["A"])),
            Update::Ignored(IgnoreReason::SessionMismatch)
        );
        assert_eq!(*t.state(), before);
    }

    #[test]
    fn start_without_session_passes_guard() {
        let mut t = tracker();
        t.set_current_session(Some("sess_mine".into()));
        let payload = StartPayload {
            session_id: None,
            ..start_payload(&["A"])
        };
        assert_eq!(t.start(&payload), Update::Applied);
    }

    #[test]
    fn start_supersedes_with_warning() {
        let (logs, _guard) = capture_logs();
        let mut t = tracker();
        let _ = t.start(&start_payload(&["A", "B"]));
        let _ = t.record_invocation(&invoked("A"));

        let next = StartPayload {
            coordination_id: Some("coord_next".into()),
            slave_profiles: vec![ProfileDescriptor::new("C", "Gamma", "3")],
            ..StartPayload::default()
        };
        assert_eq!(t.start(&next), Update::Applied);

        let keys: Vec<&str> = t.state().slave_progress.keys().map(ProfileTag::as_str).collect();
        assert_eq!(keys, ["C"]);
        assert!(t.state().profiles_invoked.is_empty());
        assert!(logs.has_event(Level::WARN, "discarding previous"));
    }

    #[test]
    fn duplicate_announced_tags_keep_first() {
        let mut t = tracker();
        let payload = StartPayload {
            slave_profiles: vec![
                ProfileDescriptor::new("A", "First", "1"),
                ProfileDescriptor::new("A", "Second", "2"),
            ],
            ..StartPayload::default()
        };
        let _ = t.start(&payload);
        assert_eq!(t.state().slave_progress["A"].name, "First");
    }

    // ── record_* while idle ─────────────────────────────────────────────

    #[test]
    fn operations_while_idle_are_no_ops() {
        let mut t = tracker();
        let before = t.state().clone();
        let idle = Update::Ignored(IgnoreReason::Idle);

        assert_eq!(t.record_routing_decision(&RoutingDecisionPayload::default()), idle);
        assert_eq!(t.record_invocation(&invoked("A")), idle);
        assert_eq!(t.record_progress(&SlaveProgressPayload::default()), idle);
        assert_eq!(t.record_completion(&SlaveCompletedPayload::default()), idle);
        assert_eq!(t.record_synthesis_start(&SynthesisStartPayload::default()), idle);
        assert!(t.finish(&CoordinationCompletePayload::default()).is_none());
        assert_eq!(*t.state(), before);
        assert!(t.is_idle());
    }

    // ── record_routing_decision ─────────────────────────────────────────

    #[test]
    fn routing_decision_stored_unvalidated() {
        let mut t = tracker();
        let _ = t.start(&start_payload(&["A"]));
        let payload = RoutingDecisionPayload {
            decision_text: Some("needs research".into()),
            selected_profiles: vec!["A".into(), "Z".into()],
        };
        assert_eq!(t.record_routing_decision(&payload), Update::Applied);
        assert_eq!(t.state().routing_decision.as_deref(), Some("needs research"));
        assert_eq!(t.state().selected_profiles.len(), 2);
    }

    // ── record_invocation ───────────────────────────────────────────────

    #[test]
    fn invocation_activates_and_dedups() {
        let mut t = tracker();
        let _ = t.start(&start_payload(&["A", "B"]));
        assert_eq!(t.record_invocation(&invoked("A")), Update::Applied);
        assert_eq!(t.record_invocation(&invoked("A")), Update::Applied);

        let rec = &t.state().slave_progress["A"];
        assert_eq!(rec.status, SlaveStatus::Active);
        assert_eq!(rec.session_id.as_ref().unwrap().as_str(), "sess_A");
        assert_eq!(rec.query.as_deref(), Some("q"));
        assert!(rec.start_time.is_some());
        assert_eq!(t.state().profiles_invoked, vec![ProfileTag::new("A")]);
    }

    #[test]
    fn invocation_of_unannounced_tag_creates_record() {
        let mut t = tracker();
        let _ = t.start(&start_payload(&["A"]));
        let payload = SlaveInvokedPayload {
            profile_id: Some("77".into()),
            ..invoked("X")
        };
        assert_eq!(t.record_invocation(&payload), Update::Applied);

        let rec = &t.state().slave_progress["X"];
        assert_eq!(rec.name, "X");
        assert_eq!(rec.id, "77");
        assert_eq!(rec.status, SlaveStatus::Active);
    }

    #[test]
    fn invocation_without_tag_ignored() {
        let mut t = tracker();
        let _ = t.start(&start_payload(&["A"]));
        let before = t.state().clone();
        assert_eq!(
            t.record_invocation(&SlaveInvokedPayload::default()),
            Update::Ignored(IgnoreReason::UnknownTag)
        );
        assert_eq!(*t.state(), before);
    }

    // ── record_progress ─────────────────────────────────────────────────

    #[test]
    fn progress_updates_in_place() {
        let mut t = tracker();
        let _ = t.start(&start_payload(&["A"]));
        let payload = SlaveProgressPayload {
            profile_tag: Some("A".into()),
            message: Some("searching".into()),
            progress_pct: Some(40.0),
            ..SlaveProgressPayload::default()
        };
        assert_eq!(t.record_progress(&payload), Update::Applied);

        let partial = SlaveProgressPayload {
            profile_tag: Some("A".into()),
            progress_pct: Some(60.0),
            ..SlaveProgressPayload::default()
        };
        let _ = t.record_progress(&partial);
        let rec = &t.state().slave_progress["A"];
        assert_eq!(rec.message.as_deref(), Some("searching"));
        assert_eq!(rec.progress_pct, Some(60.0));
    }

    #[test]
    fn progress_for_unknown_tag_is_no_op() {
        let mut t = tracker();
        let _ = t.start(&start_payload(&["A"]));
        let before = t.state().clone();
        let payload = SlaveProgressPayload {
            profile_tag: Some("nope".into()),
            message: Some("m".into()),
            ..SlaveProgressPayload::default()
        };
        assert_eq!(t.record_progress(&payload), Update::Ignored(IgnoreReason::UnknownTag));
        assert_eq!(*t.state(), before);
    }

    #[test]
    fn executing_progress_without_runtime_skips_lookup() {
        let mut t = CoordinationTracker::new(
            TrackerConfig::default(),
            Arc::new(crate::effects::NoopEffects),
            Some(Arc::new(EmptyDirectory)),
        );
        let _ = t.start(&start_payload(&["A"]));
        let payload = SlaveProgressPayload {
            profile_tag: Some("A".into()),
            status: Some("executing".into()),
            slave_session_id: Some("sess_A".into()),
            ..SlaveProgressPayload::default()
        };
        assert_eq!(t.record_progress(&payload), Update::Applied);
        assert!(t.drain_lookups().is_empty());
        assert_eq!(
            t.state().slave_progress["A"].session_id.as_ref().map(SessionId::as_str),
            Some("sess_A")
        );
    }

    struct EmptyDirectory;

    #[async_trait::async_trait]
    impl SessionDirectory for EmptyDirectory {
        async fn list_sessions(
            &self,
            _limit: u32,
            _offset: u32,
        ) -> Result<Vec<genie_core::sessions::SessionSummary>, genie_core::errors::DirectoryError>
        {
            Ok(vec![])
        }
    }

    // ── record_completion ───────────────────────────────────────────────

    #[test]
    fn completion_success_clears_error() {
        let mut t = tracker();
        let _ = t.start(&start_payload(&["A"]));
        let _ = t.record_invocation(&invoked("A"));
        let payload = SlaveCompletedPayload {
            profile_tag: Some("A".into()),
            result: Some("full answer".into()),
            duration_ms: Some(500),
            success: Some(true),
            error: Some("ignored on success".into()),
            ..SlaveCompletedPayload::default()
        };
        assert_eq!(t.record_completion(&payload), Update::Applied);

        let rec = &t.state().slave_progress["A"];
        assert_eq!(rec.status, SlaveStatus::Completed);
        assert_eq!(rec.duration_ms, Some(500));
        assert_eq!(rec.result.as_deref(), Some("full answer"));
        assert!(rec.error.is_none());
    }

    #[test]
    fn completion_failure_keeps_error() {
        let mut t = tracker();
        let _ = t.start(&start_payload(&["A"]));
        let payload = SlaveCompletedPayload {
            profile_tag: Some("A".into()),
            success: Some(false),
            error: Some("rate limited".into()),
            ..SlaveCompletedPayload::default()
        };
        let _ = t.record_completion(&payload);
        let rec = &t.state().slave_progress["A"];
        assert_eq!(rec.status, SlaveStatus::Error);
        assert_eq!(rec.error.as_deref(), Some("rate limited"));
    }

    #[test]
    fn completion_preview_is_bounded() {
        let mut t = CoordinationTracker::new(
            TrackerConfig {
                result_preview_chars: 5,
                ..TrackerConfig::default()
            },
            Arc::new(crate::effects::NoopEffects),
            None,
        );
        let _ = t.start(&start_payload(&["A"]));
        let payload = SlaveCompletedPayload {
            profile_tag: Some("A".into()),
            result_preview: Some("abcdefghij".into()),
            success: Some(true),
            ..SlaveCompletedPayload::default()
        };
        let _ = t.record_completion(&payload);
        assert_eq!(t.state().slave_progress["A"].result.as_deref(), Some("abcde…"));
    }

    #[test]
    fn completion_for_unknown_tag_ignored() {
        let mut t = tracker();
        let _ = t.start(&start_payload(&["A"]));
        let payload = SlaveCompletedPayload {
            profile_tag: Some("Q".into()),
            success: Some(true),
            ..SlaveCompletedPayload::default()
        };
        assert_eq!(
            t.record_completion(&payload),
            Update::Ignored(IgnoreReason::UnknownTag)
        );
    }

    // ── record_synthesis_start ──────────────────────────────────────────

    #[test]
    fn synthesis_start_recorded() {
        let mut t = tracker();
        let _ = t.start(&start_payload(&["A", "B"]));
        let payload = SynthesisStartPayload {
            profiles_consulted: vec!["A".into(), "B".into()],
        };
        assert_eq!(t.record_synthesis_start(&payload), Update::Applied);
        assert!(t.state().synthesis_started);
        assert_eq!(t.state().profiles_consulted.len(), 2);
    }

    // ── finish / acknowledge ────────────────────────────────────────────

    #[test]
    fn finish_is_two_phase() {
        let mut t = tracker();
        let _ = t.start(&start_payload(&["A"]));
        let _ = t.record_invocation(&invoked("A"));

        let terminal = t.finish(&CoordinationCompletePayload::default()).unwrap();
        assert_eq!(terminal.coordination_id.as_str(), "coord_test");
        assert!(terminal.final_state.is_active);
        assert_eq!(terminal.final_state.state.slave_progress.len(), 1);
        assert_eq!(terminal.telemetry.profiles_used, vec![ProfileTag::new("A")]);

        assert!(!t.is_active());
        assert_eq!(*t.state(), CoordinationState::default());
        assert!(t.is_display_active());
        assert!(t.awaiting_acknowledgement());
        assert!(!t.is_idle());

        assert!(!t.acknowledge(&CoordinationId::from_raw("coord_other")));
        assert!(t.acknowledge(&terminal.coordination_id));
        assert!(t.is_idle());
        assert!(!t.acknowledge(&terminal.coordination_id));
    }

    #[test]
    fn new_start_supersedes_pending_terminal() {
        let mut t = tracker();
        let _ = t.start(&start_payload(&["A"]));
        let _ = t.finish(&CoordinationCompletePayload::default());
        assert!(t.awaiting_acknowledgement());

        let _ = t.start(&start_payload(&["B"]));
        assert!(!t.awaiting_acknowledgement());
        assert!(t.is_active());
    }

    #[test]
    fn finish_logs_telemetry() {
        let (logs, _guard) = capture_logs();
        let mut t = tracker();
        let _ = t.start(&start_payload(&["A"]));
        let payload = CoordinationCompletePayload {
            total_duration_ms: Some(1234),
            success: Some(true),
            ..CoordinationCompletePayload::default()
        };
        let _ = t.finish(&payload);

        let event = logs
            .events()
            .into_iter()
            .find(|e| e.message.contains("coordination complete"))
            .unwrap();
        assert_eq!(event.level, Level::INFO);
        assert_eq!(event.field("total_duration_ms"), Some("1234"));
        assert_eq!(event.field("coordination_id"), Some("coord_test"));
    }

    // ── dispatch ────────────────────────────────────────────────────────

    #[test]
    fn handle_routes_by_kind() {
        let mut t = tracker();
        let outcome = t.handle_raw(
            "genie_coordination_start",
            json!({"coordination_id": "coord_d", "slave_profiles": ["A"]}),
        );
        assert_eq!(outcome, DispatchOutcome::Applied(EventKind::GenieCoordinationStart));

        let outcome = t.handle_raw("genie_slave_progress", json!({"profile_tag": "Z"}));
        assert_eq!(
            outcome,
            DispatchOutcome::Ignored(EventKind::GenieSlaveProgress, IgnoreReason::UnknownTag)
        );

        let before = t.state().clone();
        assert_eq!(
            t.handle_raw("genie_llm_step", json!({"text": "thinking"})),
            DispatchOutcome::Inert(EventKind::GenieLlmStep)
        );
        assert_eq!(*t.state(), before);

        assert_matches!(
            t.handle_raw("genie_coordination_complete", json!({})),
            DispatchOutcome::Terminal(_)
        );
        assert_eq!(
            t.handle_raw("genie_coordination_complete", json!({})),
            DispatchOutcome::Ignored(EventKind::GenieCoordinationComplete, IgnoreReason::Idle)
        );
    }

    #[test]
    fn unknown_event_logged_and_dropped() {
        let (logs, _guard) = capture_logs();
        let mut t = tracker();
        let outcome = t.handle_notification(&Notification::new("chat_delta", json!({})));
        assert_eq!(outcome, DispatchOutcome::Unknown("chat_delta".into()));
        assert!(logs.has_event(Level::WARN, "unknown event type"));
        assert!(t.is_idle());
    }

    #[test]
    fn malformed_payload_never_fails() {
        let mut t = tracker();
        assert!(t.handle_raw("genie_start", json!("garbage")).changed_state());
        assert!(t.is_active());
        assert_eq!(
            t.handle_raw("genie_slave_invoked", json!([1, 2, 3])),
            DispatchOutcome::Ignored(EventKind::GenieSlaveInvoked, IgnoreReason::UnknownTag)
        );
    }

    // ── replay ──────────────────────────────────────────────────────────

    #[test]
    fn replay_returns_last_terminal() {
        let mut t = tracker();
        let history = vec![
            Notification::new("genie_start", json!({"coordination_id": "coord_r", "slave_profiles": ["A"]})),
            Notification::new("genie_slave_invoked", json!({"profile_tag": "A"})),
            Notification::new("genie_coordination_complete", json!({"success": true})),
            Notification::new("unrelated", json!({})),
        ];
        let terminal = t.replay(history).unwrap();
        assert_eq!(terminal.coordination_id.as_str(), "coord_r");
        assert_eq!(
            terminal.final_state.state.slave_progress["A"].status,
            SlaveStatus::Active
        );
        assert!(t.awaiting_acknowledgement());
    }

    #[test]
    fn replay_of_running_coordination_leaves_it_active() {
        let mut t = tracker();
        let history = vec![
            Notification::new("genie_start", json!({"slave_profiles": ["A", "B"]})),
            Notification::new("genie_slave_invoked", json!({"profile_tag": "B"})),
        ];
        assert!(t.replay(history).is_none());
        assert!(t.is_active());
        assert_eq!(t.state().profiles_invoked, vec![ProfileTag::new("B")]);
    }

    // ── config ──────────────────────────────────────────────────────────

    #[test]
    fn config_from_settings() {
        let settings = TrackerSettings {
            expand_delay_ms: 5,
            session_lookup_limit: 7,
            ..TrackerSettings::default()
        };
        let config = TrackerConfig::from(&settings);
        assert_eq!(config.expand_delay, Duration::from_millis(5));
        assert_eq!(config.session_lookup_limit, 7);
        assert_eq!(config.session_lookup_delay, Duration::from_millis(1500));
    }
}
