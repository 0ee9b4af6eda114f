//! End-to-end coordination scenarios driven through raw notifications.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use genie_core::errors::DirectoryError;
use genie_core::events::{EventKind, Notification};
use genie_core::ids::{CoordinationId, ProfileTag};
use genie_core::logging::capture_logs;
use genie_core::sessions::{SessionDirectory, SessionSummary};
use genie_tracker::{
    CompletionTelemetry, CoordinationEffects, CoordinationState, CoordinationTracker,
    DispatchOutcome, IgnoreReason, LookupOutcome, NoopEffects, SlaveStatus, TrackerConfig,
};
use parking_lot::Mutex;
use proptest::prelude::*;
use serde_json::{Value, json};
use tracing::Level;

// ─────────────────────────────────────────────────────────────────────────────
// Fixtures
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct RecordingEffects {
    expanded: Mutex<Vec<CoordinationId>>,
    kept: Mutex<Vec<CoordinationId>>,
    finished: Mutex<Vec<CompletionTelemetry>>,
    discovered: Mutex<Vec<(CoordinationId, SessionSummary)>>,
}

impl CoordinationEffects for RecordingEffects {
    fn expand_coordination(&self, coordination_id: &CoordinationId) {
        self.expanded.lock().push(coordination_id.clone());
    }

    fn keep_expanded(&self, coordination_id: &CoordinationId) {
        self.kept.lock().push(coordination_id.clone());
    }

    fn coordination_finished(&self, telemetry: &CompletionTelemetry) {
        self.finished.lock().push(telemetry.clone());
    }

    fn delegate_session_discovered(&self, coordination_id: &CoordinationId, session: &SessionSummary) {
        self.discovered
            .lock()
            .push((coordination_id.clone(), session.clone()));
    }
}

struct FakeDirectory {
    listing: Result<Vec<SessionSummary>, DirectoryError>,
    calls: AtomicUsize,
}

impl FakeDirectory {
    fn new(listing: Result<Vec<SessionSummary>, DirectoryError>) -> Arc<Self> {
        Arc::new(Self {
            listing,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionDirectory for FakeDirectory {
    async fn list_sessions(
        &self,
        _limit: u32,
        _offset: u32,
    ) -> Result<Vec<SessionSummary>, DirectoryError> {
        let _ = self.calls.fetch_add(1, Ordering::SeqCst);
        self.listing.clone()
    }
}

fn tracker_with(
    effects: Arc<RecordingEffects>,
    directory: Option<Arc<FakeDirectory>>,
) -> CoordinationTracker {
    CoordinationTracker::new(
        TrackerConfig::default(),
        effects,
        directory.map(|d| d as Arc<dyn SessionDirectory>),
    )
}

fn plain_tracker() -> CoordinationTracker {
    CoordinationTracker::new(TrackerConfig::default(), Arc::new(NoopEffects), None)
}

fn send(tracker: &mut CoordinationTracker, event_type: &str, payload: Value) -> DispatchOutcome {
    tracker.handle_notification(&Notification::new(event_type, payload))
}

fn start_two(tracker: &mut CoordinationTracker) {
    let outcome = send(
        tracker,
        "genie_start",
        json!({
            "coordination_id": "coord_s",
            "session_id": "sess_main",
            "slave_profiles": [
                {"tag": "A", "name": "Alpha", "id": "1"},
                {"tag": "B", "name": "Beta", "id": "2"}
            ]
        }),
    );
    assert_eq!(outcome, DispatchOutcome::Applied(EventKind::GenieStart));
}

fn executing(tracker: &mut CoordinationTracker, tag: &str, session: &str) {
    let _ = send(
        tracker,
        "genie_slave_progress",
        json!({"profile_tag": tag, "status": "executing", "slave_session_id": session}),
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Lifecycle scenarios
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn full_lifecycle_returns_to_idle() {
    let mut t = plain_tracker();
    start_two(&mut t);

    let s = t.state();
    assert_eq!(s.slave_progress.len(), 2);
    assert_eq!(s.slave_progress["A"].status, SlaveStatus::Pending);
    assert_eq!(s.slave_progress["B"].name, "Beta");

    let _ = send(
        &mut t,
        "genie_slave_invoked",
        json!({"profile_tag": "A", "slave_session_id": "sess_a", "profile_id": "1", "query": "rates?", "parent_session_id": "sess_main"}),
    );
    assert_eq!(t.state().slave_progress["A"].status, SlaveStatus::Active);
    assert_eq!(t.state().profiles_invoked, vec![ProfileTag::new("A")]);

    let _ = send(
        &mut t,
        "genie_slave_completed",
        json!({"profile_tag": "A", "success": true, "duration_ms": 500, "result": "5%"}),
    );
    let a = &t.state().slave_progress["A"];
    assert_eq!(a.status, SlaveStatus::Completed);
    assert_eq!(a.duration_ms, Some(500));

    let outcome = send(
        &mut t,
        "genie_coordination_complete",
        json!({"total_duration_ms": 900, "profiles_used": ["A"], "success": true}),
    );
    let terminal = outcome.into_terminal().unwrap();
    assert_eq!(terminal.telemetry.total_duration_ms, 900);
    assert_eq!(
        terminal.final_state.state.slave_progress["A"].status,
        SlaveStatus::Completed
    );

    let snap = t.snapshot();
    assert!(snap.state.active_coordination_id.is_none());
    assert!(snap.state.slave_progress.is_empty());
    assert!(snap.state.profiles_invoked.is_empty());
    assert_eq!(snap.elapsed_ms, 0);
    assert!(!snap.is_active);

    assert!(t.acknowledge(&terminal.coordination_id));
    assert!(t.is_idle());
}

#[test]
fn progress_for_unseen_tag_leaves_state_unchanged() {
    let mut t = plain_tracker();
    start_two(&mut t);
    let before = t.state().clone();
    let outcome = send(
        &mut t,
        "genie_slave_progress",
        json!({"profile_tag": "Q", "message": "hello", "progress_pct": 10}),
    );
    assert_eq!(
        outcome,
        DispatchOutcome::Ignored(EventKind::GenieSlaveProgress, IgnoreReason::UnknownTag)
    );
    assert_eq!(*t.state(), before);
}

#[test]
fn supersede_resets_and_warns() {
    let (logs, _guard) = capture_logs();
    let mut t = plain_tracker();
    start_two(&mut t);
    let _ = send(&mut t, "genie_slave_invoked", json!({"profile_tag": "B"}));

    let _ = send(
        &mut t,
        "genie_coordination_start",
        json!({"coordination_id": "coord_2", "slave_profiles": [{"tag": "C", "name": "Gamma", "id": "3"}]}),
    );
    let tags: Vec<&str> = t.state().slave_progress.keys().map(ProfileTag::as_str).collect();
    assert_eq!(tags, ["C"]);
    assert!(t.state().profiles_invoked.is_empty());
    assert!(logs.has_event(Level::WARN, "discarding previous"));
}

#[test]
fn session_guard_filters_foreign_starts() {
    let mut t = plain_tracker();
    t.set_current_session(Some("sess_other".into()));
    let outcome = send(&mut t, "genie_start", json!({"session_id": "sess_main"}));
    assert_eq!(
        outcome,
        DispatchOutcome::Ignored(EventKind::GenieStart, IgnoreReason::SessionMismatch)
    );
    assert!(t.is_idle());
}

#[test]
fn inert_events_never_touch_state() {
    let mut t = plain_tracker();
    start_two(&mut t);
    let before = t.state().clone();
    assert_eq!(
        send(&mut t, "genie_synthesis_complete", json!({"answer": "x"})),
        DispatchOutcome::Inert(EventKind::GenieSynthesisComplete)
    );
    assert_eq!(*t.state(), before);
}

// ─────────────────────────────────────────────────────────────────────────────
// Effects and lookups
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn expand_fires_after_delay() {
    let effects = Arc::new(RecordingEffects::default());
    let mut t = tracker_with(effects.clone(), None);
    start_two(&mut t);

    assert!(effects.expanded.lock().is_empty());
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(*effects.expanded.lock(), vec![CoordinationId::from_raw("coord_s")]);
}

#[tokio::test(start_paused = true)]
async fn finish_calls_effects() {
    let effects = Arc::new(RecordingEffects::default());
    let mut t = tracker_with(effects.clone(), None);
    start_two(&mut t);
    let _ = send(&mut t, "genie_coordination_complete", json!({"success": false, "error": "boom"}));

    assert_eq!(*effects.kept.lock(), vec![CoordinationId::from_raw("coord_s")]);
    let finished = effects.finished.lock();
    assert_eq!(finished.len(), 1);
    assert!(!finished[0].success);
    assert_eq!(finished[0].error.as_deref(), Some("boom"));
}

#[tokio::test(start_paused = true)]
async fn lookup_surfaces_session_once() {
    let effects = Arc::new(RecordingEffects::default());
    let directory = FakeDirectory::new(Ok(vec![
        SessionSummary::new("sess_unrelated".into()),
        SessionSummary::new("sess_a".into()),
    ]));
    let mut t = tracker_with(effects.clone(), Some(directory.clone()));
    start_two(&mut t);
    let _ = send(&mut t, "genie_slave_invoked", json!({"profile_tag": "A", "slave_session_id": "sess_a"}));

    executing(&mut t, "A", "sess_a");
    executing(&mut t, "A", "sess_a");
    let _ = send(
        &mut t,
        "genie_slave_progress",
        json!({"profile_tag": "A", "status": "thinking", "slave_session_id": "sess_a"}),
    );

    let handles = t.drain_lookups();
    assert_eq!(handles.len(), 1);
    let outcome = handles.into_iter().next().unwrap().await.unwrap();
    assert_matches!(outcome, LookupOutcome::Surfaced(ref s) if s.id.as_str() == "sess_a");

    assert_eq!(directory.calls(), 1);
    let discovered = effects.discovered.lock();
    assert_eq!(discovered.len(), 1);
    assert_eq!(discovered[0].0.as_str(), "coord_s");
}

#[tokio::test(start_paused = true)]
async fn lookup_tolerates_not_found() {
    let effects = Arc::new(RecordingEffects::default());
    let directory = FakeDirectory::new(Err(DirectoryError::NotFound));
    let mut t = tracker_with(effects.clone(), Some(directory.clone()));
    start_two(&mut t);
    executing(&mut t, "B", "sess_b");

    let outcome = t.drain_lookups().pop().unwrap().await.unwrap();
    assert_eq!(outcome, LookupOutcome::NotVisible);
    assert_eq!(directory.calls(), 1);
    assert!(effects.discovered.lock().is_empty());
    assert!(t.is_active());
}

#[tokio::test(start_paused = true)]
async fn lookup_failure_is_swallowed() {
    let directory = FakeDirectory::new(Err(DirectoryError::Status {
        status: 500,
        body: "oops".into(),
    }));
    let mut t = tracker_with(Arc::new(RecordingEffects::default()), Some(directory));
    start_two(&mut t);
    executing(&mut t, "A", "sess_a");

    let outcome = t.drain_lookups().pop().unwrap().await.unwrap();
    assert_matches!(outcome, LookupOutcome::Failed(DirectoryError::Status { status: 500, .. }));
}

#[tokio::test(start_paused = true)]
async fn finish_cancels_pending_lookup() {
    let effects = Arc::new(RecordingEffects::default());
    let directory = FakeDirectory::new(Ok(vec![SessionSummary::new("sess_a".into())]));
    let mut t = tracker_with(effects.clone(), Some(directory.clone()));
    start_two(&mut t);
    executing(&mut t, "A", "sess_a");
    let _ = send(&mut t, "genie_coordination_complete", json!({}));

    let outcome = t.drain_lookups().pop().unwrap().await.unwrap();
    assert_eq!(outcome, LookupOutcome::Cancelled);
    assert_eq!(directory.calls(), 0);
    assert!(effects.discovered.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn supersede_cancels_pending_lookup() {
    let directory = FakeDirectory::new(Ok(vec![SessionSummary::new("sess_a".into())]));
    let mut t = tracker_with(Arc::new(RecordingEffects::default()), Some(directory.clone()));
    start_two(&mut t);
    executing(&mut t, "A", "sess_a");
    let first = t.drain_lookups();

    start_two(&mut t);
    executing(&mut t, "A", "sess_a");
    let second = t.drain_lookups();

    assert_eq!(first.into_iter().next().unwrap().await.unwrap(), LookupOutcome::Cancelled);
    assert_matches!(
        second.into_iter().next().unwrap().await.unwrap(),
        LookupOutcome::Surfaced(_)
    );
    assert_eq!(directory.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn replay_suppresses_effects_and_lookups() {
    let effects = Arc::new(RecordingEffects::default());
    let directory = FakeDirectory::new(Ok(vec![SessionSummary::new("sess_a".into())]));
    let mut t = tracker_with(effects.clone(), Some(directory.clone()));

    let history = vec![
        Notification::new("genie_start", json!({"coordination_id": "coord_h", "slave_profiles": ["A"]})),
        Notification::new("genie_slave_progress", json!({"profile_tag": "A", "status": "executing", "slave_session_id": "sess_a"})),
        Notification::new("genie_coordination_complete", json!({})),
    ];
    let terminal = t.replay(history).unwrap();
    assert_eq!(terminal.coordination_id.as_str(), "coord_h");

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(t.drain_lookups().is_empty());
    assert!(effects.expanded.lock().is_empty());
    assert!(effects.finished.lock().is_empty());
    assert_eq!(directory.calls(), 0);

    // live events after a replay schedule effects again
    start_two(&mut t);
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(effects.expanded.lock().len(), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Properties
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
enum Op {
    Routing,
    Invoke(usize),
    Progress(usize, bool),
    Complete(usize, bool),
    Synthesis,
    Inert,
}

const TAGS: [&str; 4] = ["A", "B", "C", "D"];

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Routing),
        (0..TAGS.len()).prop_map(Op::Invoke),
        (0..TAGS.len(), any::<bool>()).prop_map(|(i, e)| Op::Progress(i, e)),
        (0..TAGS.len(), any::<bool>()).prop_map(|(i, s)| Op::Complete(i, s)),
        Just(Op::Synthesis),
        Just(Op::Inert),
    ]
}

fn apply(t: &mut CoordinationTracker, op: &Op) -> DispatchOutcome {
    match op {
        Op::Routing => send(t, "genie_routing_decision", json!({"decision_text": "x", "selected_profiles": ["A"]})),
        Op::Invoke(i) => send(t, "genie_slave_invoked", json!({"profile_tag": TAGS[*i], "slave_session_id": format!("sess_{i}")})),
        Op::Progress(i, executing) => {
            let status = if *executing { "executing" } else { "thinking" };
            send(
                t,
                "genie_slave_progress",
                json!({"profile_tag": TAGS[*i], "status": status, "progress_pct": 50}),
            )
        }
        Op::Complete(i, success) => send(t, "genie_slave_completed", json!({"profile_tag": TAGS[*i], "success": success})),
        Op::Synthesis => send(t, "genie_synthesis_start", json!({"profiles_consulted": ["A", "B"]})),
        Op::Inert => send(t, "genie_llm_step", json!({})),
    }
}

proptest! {
    #[test]
    fn complete_always_returns_to_idle(ops in prop::collection::vec(op_strategy(), 0..40)) {
        let mut t = plain_tracker();
        start_two(&mut t);
        for op in &ops {
            let _ = apply(&mut t, op);
        }
        let terminal = send(&mut t, "genie_coordination_complete", json!({})).into_terminal();
        prop_assert!(terminal.is_some());
        prop_assert_eq!(t.snapshot().state, CoordinationState::default());
        prop_assert!(!t.is_active());
    }

    #[test]
    fn profiles_invoked_has_no_duplicates(ops in prop::collection::vec(op_strategy(), 0..40)) {
        let mut t = plain_tracker();
        start_two(&mut t);
        for op in &ops {
            let _ = apply(&mut t, op);
            let invoked = &t.state().profiles_invoked;
            for (i, tag) in invoked.iter().enumerate() {
                prop_assert!(!invoked[i + 1..].contains(tag));
            }
            for tag in t.state().slave_progress.keys() {
                let announced = t.state().available_profiles.iter().any(|p| &p.tag == tag);
                prop_assert!(announced || invoked.contains(tag));
            }
        }
    }

    #[test]
    fn operations_while_idle_are_no_ops(ops in prop::collection::vec(op_strategy(), 0..20)) {
        let mut t = plain_tracker();
        for op in &ops {
            let outcome = apply(&mut t, op);
            prop_assert!(!outcome.changed_state());
            prop_assert_eq!(t.state(), &CoordinationState::default());
        }
    }
}
