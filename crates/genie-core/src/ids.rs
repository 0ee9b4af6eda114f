//! Branded ID newtypes for type safety.
//!
//! Coordinations and sessions each get a distinct ID type implemented as a
//! newtype wrapper around `String`, so a delegate session ID can never be
//! passed where a coordination ID is expected. Generated IDs are prefixed
//! UUID v7 strings (time-ordered); IDs received from the server are wrapped
//! verbatim via `from_raw`.
//!
//! [`ProfileTag`] is never generated locally: it is the short label a
//! coordination assigns to each delegate profile.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident, $prefix:expr) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new prefixed ID (UUID v7, time-ordered).
            #[must_use]
            pub fn new() -> Self {
                Self(format!("{}_{}", $prefix, Uuid::now_v7()))
            }

            /// Wrap an existing string value without validation.
            #[must_use]
            pub fn from_raw(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

branded_id! {
    /// Identifier of one coordination run.
    CoordinationId, "coord"
}

branded_id! {
    /// Identifier of a chat session (the Genie's own or a delegate's).
    SessionId, "sess"
}

/// Short label identifying a delegate profile within one coordination.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileTag(String);

impl ProfileTag {
    /// Wrap a tag string.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Return the inner string as a slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProfileTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProfileTag {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for ProfileTag {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::borrow::Borrow<str> for ProfileTag {
    fn borrow(&self) -> &str {
        &self.0
    }
}
