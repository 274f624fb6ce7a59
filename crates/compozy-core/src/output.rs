//! Free-form JSON-shaped task/tool payloads.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A free-form JSON object: task input/output, tool arguments, and the like.
///
/// Always object-shaped. `Output::empty()` is `{}`, distinct from "no output at all",
/// which callers represent as `Option<Output>` — see [`crate::jsonb`] for how that
/// distinction is preserved end to end through a JSONB column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Output(Map<String, Value>);

impl Output {
    pub fn empty() -> Self {
        Self(Map::new())
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for Output {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for Output {
    type Error = serde_json::Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => serde_json::from_value(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_output_serializes_to_empty_object() {
        let out = Output::empty();
        assert_eq!(serde_json::to_value(&out).unwrap(), json!({}));
    }

    #[test]
    fn insert_and_get_roundtrip() {
        let mut out = Output::empty();
        out.insert("answer", json!(42));
        assert_eq!(out.get("answer"), Some(&json!(42)));
        assert!(!out.is_empty());
    }

    #[test]
    fn try_from_object_value_succeeds() {
        let out = Output::try_from(json!({"k": "v"})).unwrap();
        assert_eq!(out.get("k"), Some(&json!("v")));
    }

    #[test]
    fn try_from_non_object_value_fails() {
        assert!(Output::try_from(json!(5)).is_err());
    }
}
