//! Strong `ETag` parsing (RFC 7232), rejecting weak tags and the `*` wildcard.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EtagError {
    #[error("wildcard etag is not a strong etag")]
    Wildcard,
    #[error("weak etag is not a strong etag")]
    Weak,
    #[error("empty etag header")]
    Empty,
}

/// Trims the header, keeps only the first comma-separated value, strips surrounding
/// quotes, and rejects anything that is `*` or weak (`W/` / `w/` prefixed, including
/// after quote-stripping).
pub fn parse_strong_etag(header: &str) -> Result<String, EtagError> {
    let trimmed = header.trim();
    if trimmed.is_empty() {
        return Err(EtagError::Empty);
    }
    let first = trimmed.split(',').next().unwrap_or("").trim();
    if first == "*" {
        return Err(EtagError::Wildcard);
    }
    if first.starts_with("W/") || first.starts_with("w/") {
        return Err(EtagError::Weak);
    }
    let unquoted = first.strip_prefix('"').and_then(|s| s.strip_suffix('"')).unwrap_or(first);
    if unquoted.starts_with("W/") || unquoted.starts_with("w/") {
        return Err(EtagError::Weak);
    }
    Ok(unquoted.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_quoted_strong_etag() {
        assert_eq!(parse_strong_etag("\"abc123\"").unwrap(), "abc123");
    }

    #[test]
    fn rejects_wildcard() {
        assert_eq!(parse_strong_etag("*"), Err(EtagError::Wildcard));
    }

    #[test]
    fn rejects_weak_prefix_before_and_after_unquoting() {
        assert_eq!(parse_strong_etag("W/\"abc\""), Err(EtagError::Weak));
        assert_eq!(parse_strong_etag("\"W/abc\""), Err(EtagError::Weak));
    }

    #[test]
    fn keeps_only_the_first_of_a_comma_separated_list() {
        assert_eq!(parse_strong_etag("\"a\", \"b\"").unwrap(), "a");
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(parse_strong_etag("   "), Err(EtagError::Empty));
    }
}
