//! JSONB codec: a symmetric marshal/unmarshal pair that treats `None` as SQL NULL.
//!
//! Absence is NULL, presence of an empty value (`Some(Output::empty())`) is `{}`; the
//! two must never be confused. `Option<T>::None` is the only way Rust expresses
//! "absent" regardless of `T`, so cases that some languages split into "nil" and
//! "nil-valued typed pointer" collapse into this single case here by construction —
//! there is nothing left for the codec to distinguish beyond null-vs-bytes.

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JsonbError {
    #[error("failed to marshal value to JSONB: {0}")]
    Marshal(#[source] serde_json::Error),
    #[error("failed to unmarshal JSONB value: {0}")]
    Unmarshal(#[source] serde_json::Error),
}

/// Bytes destined for a JSONB column, or SQL NULL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Jsonb {
    Null,
    Bytes(Vec<u8>),
}

impl Jsonb {
    pub fn is_null(&self) -> bool {
        matches!(self, Jsonb::Null)
    }
}

/// Marshal `value` for storage. `None` always yields [`Jsonb::Null`].
pub fn to_jsonb<T: Serialize>(value: Option<&T>) -> Result<Jsonb, JsonbError> {
    match value {
        None => Ok(Jsonb::Null),
        Some(v) => {
            let bytes = serde_json::to_vec(v).map_err(JsonbError::Marshal)?;
            Ok(Jsonb::Bytes(bytes))
        }
    }
}

/// Unmarshal a JSONB column. `Jsonb::Null` always yields `None`.
pub fn from_jsonb<T: DeserializeOwned>(src: &Jsonb) -> Result<Option<T>, JsonbError> {
    match src {
        Jsonb::Null => Ok(None),
        Jsonb::Bytes(bytes) => {
            let value = serde_json::from_slice(bytes).map_err(JsonbError::Unmarshal)?;
            Ok(Some(value))
        }
    }
}

/// Convenience for the common sqlx case: a nullable `serde_json::Value` column already
/// decoded by the driver. Mirrors [`from_jsonb`] without re-parsing bytes.
pub fn from_json_value<T: DeserializeOwned>(
    src: Option<serde_json::Value>,
) -> Result<Option<T>, JsonbError> {
    match src {
        None => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(JsonbError::Unmarshal),
    }
}

/// The inverse of [`from_json_value`]: turns an optional value into the
/// `Option<serde_json::Value>` sqlx binds directly against a JSONB column.
pub fn to_json_value<T: Serialize>(
    value: Option<&T>,
) -> Result<Option<serde_json::Value>, JsonbError> {
    match value {
        None => Ok(None),
        Some(v) => serde_json::to_value(v)
            .map(Some)
            .map_err(JsonbError::Marshal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Output;
    use serde_json::json;

    #[test]
    fn none_marshals_to_null() {
        assert_eq!(to_jsonb::<Output>(None).unwrap(), Jsonb::Null);
    }

    #[test]
    fn empty_object_is_not_null() {
        let out = Output::empty();
        let encoded = to_jsonb(Some(&out)).unwrap();
        assert!(!encoded.is_null());
        assert_eq!(encoded, Jsonb::Bytes(b"{}".to_vec()));
    }

    #[test]
    fn null_unmarshals_to_none() {
        let decoded: Option<Output> = from_jsonb(&Jsonb::Null).unwrap();
        assert_eq!(decoded, None);
    }

    #[test]
    fn roundtrip_preserves_value() {
        let mut out = Output::empty();
        out.insert("k", json!("v"));
        let encoded = to_jsonb(Some(&out)).unwrap();
        let decoded: Option<Output> = from_jsonb(&encoded).unwrap();
        assert_eq!(decoded, Some(out));
    }

    #[test]
    fn json_value_none_roundtrip() {
        assert_eq!(to_json_value::<Output>(None).unwrap(), None);
        let decoded: Option<Output> = from_json_value(None).unwrap();
        assert_eq!(decoded, None);
    }

    #[test]
    fn json_value_roundtrip_preserves_empty_object() {
        let out = Output::empty();
        let value = to_json_value(Some(&out)).unwrap();
        assert_eq!(value, Some(json!({})));
        let decoded: Option<Output> = from_json_value(value).unwrap();
        assert_eq!(decoded, Some(out));
    }
}
