//! Outcomes of tracker operations and event dispatch.

use std::fmt;

use genie_core::events::EventKind;

use crate::terminal::TerminalSnapshot;

/// Why an operation left the state untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IgnoreReason {
    /// No coordination is active.
    Idle,
    /// The start event belongs to a session other than the displayed one.
    SessionMismatch,
    /// The event names a delegate tag the coordination does not know.
    UnknownTag,
}

impl IgnoreReason {
    /// Short name for logging.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::SessionMismatch => "session_mismatch",
            Self::UnknownTag => "unknown_tag",
        }
    }
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one state operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Update {
    /// The state changed.
    Applied,
    /// The state is unchanged.
    Ignored(IgnoreReason),
}

/// Result of dispatching one event.
#[derive(Clone, Debug, PartialEq)]
pub enum DispatchOutcome {
    /// The event changed the state.
    Applied(EventKind),
    /// The event was understood but had no effect.
    Ignored(EventKind, IgnoreReason),
    /// Display-only kind; the state is never touched.
    Inert(EventKind),
    /// Event name outside the Genie family.
    Unknown(String),
    /// The coordination finished; the snapshot awaits acknowledgement.
    Terminal(Box<TerminalSnapshot>),
}

impl DispatchOutcome {
    /// Wrap an operation result.
    #[must_use]
    pub fn from_update(kind: EventKind, update: Update) -> Self {
        match update {
            Update::Applied => Self::Applied(kind),
            Update::Ignored(reason) => Self::Ignored(kind, reason),
        }
    }

    /// Whether the event changed the state (a terminal event always does).
    #[must_use]
    pub fn changed_state(&self) -> bool {
        matches!(self, Self::Applied(_) | Self::Terminal(_))
    }

    /// The terminal snapshot, if this was the completion event.
    #[must_use]
    pub fn into_terminal(self) -> Option<TerminalSnapshot> {
        match self {
            Self::Terminal(terminal) => Some(*terminal),
            _ => None,
        }
    }
}
