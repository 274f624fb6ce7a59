//! `fields=`/`expand=` query-parameter parsing: comma- or whitespace-separated tokens.

use std::collections::HashSet;

/// `lowercase` should be `true` for `expand` (case-insensitive tokens), `false` for
/// `fields` (field names are case-sensitive).
pub fn parse_token_set(raw: &str, lowercase: bool) -> HashSet<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(|token| if lowercase { token.to_lowercase() } else { token.to_string() })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_comma_and_whitespace() {
        let set = parse_token_set("a, b  c,,d", false);
        assert_eq!(set, ["a", "b", "c", "d"].into_iter().map(String::from).collect());
    }

    #[test]
    fn lowercases_expand_tokens() {
        let set = parse_token_set("Usage,State", true);
        assert_eq!(set, ["usage", "state"].into_iter().map(String::from).collect());
    }

    #[test]
    fn empty_input_yields_empty_set() {
        assert!(parse_token_set("", false).is_empty());
    }
}
