//! Pagination cursor codec and limit clamping.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use thiserror::Error;

const CURSOR_PREFIX: &str = "v2";
const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    After,
    Before,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Direction::After => "after",
            Direction::Before => "before",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "after" => Some(Direction::After),
            "before" => Some(Direction::Before),
            _ => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CursorError {
    #[error("invalid cursor encoding")]
    InvalidEncoding,
    #[error("invalid cursor shape")]
    InvalidShape,
}

pub fn encode_cursor(direction: Direction, value: &str) -> String {
    let payload = format!("{CURSOR_PREFIX}:{}:{value}", direction.as_str());
    URL_SAFE_NO_PAD.encode(payload)
}

pub fn decode_cursor(cursor: &str) -> Result<(Direction, String), CursorError> {
    let bytes = URL_SAFE_NO_PAD.decode(cursor).map_err(|_| CursorError::InvalidEncoding)?;
    let payload = String::from_utf8(bytes).map_err(|_| CursorError::InvalidEncoding)?;
    let mut parts = payload.splitn(3, ':');
    let version = parts.next().ok_or(CursorError::InvalidShape)?;
    let direction = parts.next().ok_or(CursorError::InvalidShape)?;
    let value = parts.next().ok_or(CursorError::InvalidShape)?;
    if version != CURSOR_PREFIX || value.is_empty() {
        return Err(CursorError::InvalidShape);
    }
    let direction = Direction::parse(direction).ok_or(CursorError::InvalidShape)?;
    Ok((direction, value.to_string()))
}

/// Falls back to the default on parse failure or a non-positive value; clamps to the
/// maximum rather than rejecting.
pub fn parse_limit(raw: Option<&str>) -> i64 {
    let parsed = raw.and_then(|s| s.parse::<i64>().ok());
    match parsed {
        Some(n) if n <= 0 => DEFAULT_LIMIT,
        Some(n) if n > MAX_LIMIT => MAX_LIMIT,
        Some(n) => n,
        None => DEFAULT_LIMIT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_round_trips() {
        let encoded = encode_cursor(Direction::After, "task-123");
        assert_eq!(decode_cursor(&encoded).unwrap(), (Direction::After, "task-123".to_string()));
    }

    #[test]
    fn rejects_bad_shape() {
        let encoded = URL_SAFE_NO_PAD.encode("v1:after:x");
        assert_eq!(decode_cursor(&encoded), Err(CursorError::InvalidShape));
    }

    #[test]
    fn limit_defaults_and_clamps() {
        assert_eq!(parse_limit(None), 50);
        assert_eq!(parse_limit(Some("-1")), 50);
        assert_eq!(parse_limit(Some("0")), 50);
        assert_eq!(parse_limit(Some("not a number")), 50);
        assert_eq!(parse_limit(Some("10000")), 500);
        assert_eq!(parse_limit(Some("100")), 100);
    }
}
