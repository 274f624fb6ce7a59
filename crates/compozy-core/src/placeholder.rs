//! Positional-parameter placeholder lists for dynamic `IN (...)` / `VALUES (...)` SQL.

/// Returns `"$start,$start+1,...,$start+n-1"`. Returns `""` when `n <= 0`.
pub fn dollar_list(start: i64, n: i64) -> String {
    if n <= 0 {
        return String::new();
    }
    (0..n)
        .map(|i| format!("${}", start + i))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_or_negative_count_is_empty() {
        assert_eq!(dollar_list(1, 0), "");
        assert_eq!(dollar_list(1, -5), "");
    }

    #[test]
    fn single_placeholder() {
        assert_eq!(dollar_list(1, 1), "$1");
    }

    #[test]
    fn sequential_from_arbitrary_start() {
        assert_eq!(dollar_list(3, 4), "$3,$4,$5,$6");
    }

    #[test]
    fn comma_and_dollar_counts_match_n() {
        for n in 1..10i64 {
            let s = dollar_list(1, n);
            assert_eq!(s.matches(',').count() as i64, n - 1);
            assert_eq!(s.matches('$').count() as i64, n);
        }
    }
}
