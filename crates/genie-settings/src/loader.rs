//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`GenieSettings::default()`]
//! 2. If the settings file exists, deep-merge user values over defaults
//! 3. Apply `GENIE_*` environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::GenieSettings;

/// Resolve the path to the settings file (`~/.genie/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".genie").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<GenieSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<GenieSettings> {
    let defaults = serde_json::to_value(GenieSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let user: Value = serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: GenieSettings = serde_json::from_value(merged)?;
    apply_overrides(&mut settings, |name| std::env::var(name).ok());
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `GENIE_*` overrides read through `lookup`.
///
/// Invalid numeric values are ignored with a warning (file/default wins).
/// Taking the lookup as a closure keeps this testable without touching the
/// process environment.
pub fn apply_overrides<F>(settings: &mut GenieSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let string = |name: &str| lookup(name).filter(|v| !v.is_empty());
    let number = |name: &str, min: u64, max: u64| {
        let raw = lookup(name)?;
        let parsed = parse_u64_range(&raw, min, max);
        if parsed.is_none() {
            tracing::warn!(key = name, value = %raw, "invalid numeric env var, ignoring");
        }
        parsed
    };

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = string("GENIE_BASE_URL") {
        settings.server.base_url = v;
    }
    if let Some(v) = string("GENIE_AUTH_TOKEN") {
        settings.server.auth_token = Some(v);
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = string("GENIE_LOG_LEVEL") {
        settings.logging.level = v;
    }

    // ── Tracker ─────────────────────────────────────────────────────
    if let Some(v) = number("GENIE_EXPAND_DELAY_MS", 0, 60_000) {
        settings.tracker.expand_delay_ms = v;
    }
    if let Some(v) = number("GENIE_LOOKUP_DELAY_MS", 0, 600_000) {
        settings.tracker.session_lookup_delay_ms = v;
    }
    if let Some(v) = number("GENIE_LOOKUP_LIMIT", 1, 1_000) {
        // bounded by the range check above
        settings.tracker.session_lookup_limit = u32::try_from(v).unwrap_or(u32::MAX);
    }
}

/// Parse a string as a `u64` within an inclusive range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
