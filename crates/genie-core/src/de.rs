//! Lenient field deserializers for notification payloads.
//!
//! The notification channel is produced by a dynamically typed backend, so
//! a field may arrive as the wrong JSON type, as a float where an integer was
//! expected, or as a numeric string. Every helper here accepts whatever JSON
//! value is present and maps anything unusable to "absent" instead of failing
//! the whole payload. Use with `#[serde(default, deserialize_with = "...")]`.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::ids::ProfileTag;

/// String-like field. Numbers are stringified; empty strings and every other
/// type decode as `None`.
pub fn opt_string<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: From<String>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(string_of(&value).map(T::from))
}

/// Non-negative integer field. Floats are truncated, numeric strings parsed.
pub fn opt_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(f64_of(&value).and_then(|f| {
        if f.is_finite() && f >= 0.0 {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let n = f as u64;
            Some(n)
        } else {
            None
        }
    }))
}

/// Finite floating point field. Numeric strings are parsed.
pub fn opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(f64_of(&value).filter(|f| f.is_finite()))
}

/// Boolean field. Accepts JSON booleans, `0`/`1`, and `"true"`/`"false"`.
pub fn opt_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(b) => Some(b),
        Value::Number(n) => n.as_i64().map(|i| i != 0),
        Value::String(s) => match s.to_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

/// Profile tag field. Same as [`opt_string`], with surrounding whitespace
/// trimmed so every event names a delegate the same way.
pub fn opt_tag<'de, D>(deserializer: D) -> Result<Option<ProfileTag>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(tag_of(&value).map(ProfileTag::from))
}

/// List of profile tags. Entries may be tag strings or objects carrying a
/// `tag` field; anything else is skipped. A non-array decodes as empty.
pub fn tag_list<'de, D>(deserializer: D) -> Result<Vec<ProfileTag>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let Value::Array(items) = value else {
        return Ok(Vec::new());
    };
    Ok(items
        .iter()
        .filter_map(|item| match item {
            Value::Object(map) => map.get("tag").and_then(tag_of),
            other => tag_of(other),
        })
        .map(ProfileTag::from)
        .collect())
}

/// Extract a non-empty string from a string or number value.
pub(crate) fn string_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Extract a profile tag: a string or number, trimmed, never empty.
pub(crate) fn tag_of(value: &Value) -> Option<String> {
    string_of(value)
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
}

fn f64_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
