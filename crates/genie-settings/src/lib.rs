//! # genie-settings
//!
//! Configuration with layered sources for the Genie monitor.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`GenieSettings::default()`]
//! 2. **User file**: `~/.genie/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `GENIE_*` overrides (highest priority)
//!
//! Settings are passed explicitly to the components that need them; there is
//! no process-wide settings singleton.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_overrides, deep_merge, load_settings, load_settings_from_path, settings_path,
};
pub use types::*;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
