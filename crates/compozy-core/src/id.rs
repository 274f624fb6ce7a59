//! Opaque execution identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An opaque identifier: a task execution id, workflow execution id, agent id, etc.
///
/// Equality is byte-equality on the underlying value. The only semantic predicate is
/// [`Id::is_zero`] — whether the value is the empty string.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct Id(String);

impl Id {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The zero value: the empty id.
    pub fn zero() -> Self {
        Self(String::new())
    }

    /// True iff this id carries no value.
    pub fn is_zero(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Id {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Id {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl AsRef<str> for Id {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_value_is_empty() {
        assert!(Id::zero().is_zero());
        assert!(Id::new("").is_zero());
        assert!(!Id::new("x1").is_zero());
    }

    #[test]
    fn equality_is_byte_equality() {
        assert_eq!(Id::new("abc"), Id::new("abc"));
        assert_ne!(Id::new("abc"), Id::new("ABC"));
    }

    #[test]
    fn serde_roundtrip_is_transparent() {
        let id = Id::new("task-exec-1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"task-exec-1\"");
        let back: Id = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn display_matches_inner_value() {
        assert_eq!(Id::new("wf-7").to_string(), "wf-7");
    }
}
