//! # genie-core
//!
//! Foundation types for tracking Genie multi-agent coordinations.
//!
//! This crate provides the shared vocabulary that the other Genie crates depend on:
//!
//! - **Branded IDs**: `CoordinationId`, `SessionId`, `ProfileTag` as newtypes for type safety
//! - **Events**: `EventKind` and `GenieEvent`, the closed set of notifications a
//!   coordination emits, decoded leniently from raw JSON payloads
//! - **Sessions**: `SessionSummary` and the `SessionDirectory` lookup trait
//! - **Errors**: `DirectoryError` via `thiserror`
//! - **Logging**: subscriber setup and log capture for tests

#![deny(unsafe_code)]

pub mod constants;
pub mod de;
pub mod errors;
pub mod events;
pub mod ids;
pub mod logging;
pub mod sessions;
pub mod text;
