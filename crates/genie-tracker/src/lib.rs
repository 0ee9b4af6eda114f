//! # genie-tracker
//!
//! Best-effort mirror of a server-driven Genie coordination.
//!
//! A [`CoordinationTracker`] consumes decoded coordination events in order and
//! projects them onto a [`CoordinationState`]. Consumers read it through
//! [`CoordinationTracker::snapshot`] and drive their display from it.
//!
//! - **Dispatch**: [`CoordinationTracker::handle`] routes a
//!   [`GenieEvent`](genie_core::events::GenieEvent) to one operation and
//!   reports a [`DispatchOutcome`]; nothing here returns an error
//! - **Terminal protocol**: the completion event resets the state and yields a
//!   [`TerminalSnapshot`]; the tracker stays display-active until the
//!   consumer calls [`CoordinationTracker::acknowledge`]
//! - **Effects**: cosmetic hooks go through [`CoordinationEffects`]
//! - **Lookups**: newly spawned delegate sessions are discovered through a
//!   single cancellable [`SessionDirectory`](genie_core::sessions::SessionDirectory)
//!   call, discarded when the coordination has moved on

#![deny(unsafe_code)]

pub mod dispatch;
pub mod effects;
pub mod lookup;
pub mod state;
pub mod terminal;
pub mod tracker;

pub use dispatch::{DispatchOutcome, IgnoreReason, Update};
pub use effects::{CoordinationEffects, NoopEffects};
pub use lookup::LookupOutcome;
pub use state::{CoordinationSnapshot, CoordinationState, SlaveRecord, SlaveStatus};
pub use terminal::{CompletionTelemetry, TerminalSnapshot};
pub use tracker::{CoordinationTracker, TrackerConfig};
