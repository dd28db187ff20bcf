//! Numeric parser — pull an optional decimal out of captured text.
//!
//! No currency handling: a `price` item carries the same numeric value a
//! `number` item would. Deterministic, no side effects.

use regex::Regex;

/// Collapse whitespace runs (including newlines) to single spaces and trim.
pub fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Find and parse the first numeric token in `raw`.
///
/// A token is an optionally signed integer or decimal that may contain `,`
/// grouping separators, e.g. `"$1,234.56"` → `1234.56`, `"Qty: 3"` → `3`,
/// `"-42"` → `-42`. Returns `None` when no token is present or the cleaned
/// token fails to parse.
pub fn parse_numeric(raw: &str) -> Option<f64> {
    let text = collapse_whitespace(raw);
    let token_re = Regex::new(r"[+-]?\d[\d,]*(?:\.\d+)?").expect("numeric token regex is valid");
    let token = token_re.find(&text)?;
    let cleaned: String = token.as_str().chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_with_grouping() {
        assert_eq!(parse_numeric("$1,234.56"), Some(1234.56));
        assert_eq!(parse_numeric("€ 2,000"), Some(2000.0));
    }

    #[test]
    fn test_labelled_integer() {
        assert_eq!(parse_numeric("Qty: 3"), Some(3.0));
        assert_eq!(parse_numeric("In stock: 12 units"), Some(12.0));
    }

    #[test]
    fn test_signed() {
        assert_eq!(parse_numeric("-42"), Some(-42.0));
        assert_eq!(parse_numeric("+3.5%"), Some(3.5));
    }

    #[test]
    fn test_whitespace_runs_collapsed() {
        assert_eq!(parse_numeric("  19.99\n\t USD "), Some(19.99));
        assert_eq!(collapse_whitespace(" a \n b\t\tc "), "a b c");
    }

    #[test]
    fn test_first_token_wins() {
        assert_eq!(parse_numeric("was 100, now 80"), Some(100.0));
    }

    #[test]
    fn test_no_digits_is_none() {
        assert_eq!(parse_numeric("sold out"), None);
        assert_eq!(parse_numeric(""), None);
        assert_eq!(parse_numeric("$ --"), None);
    }
}
