//! Closing-keyword cross-referencing.
//!
//! A revision body that says "Closes #10" links the revision to work
//! item 10. Matching is case-insensitive and only the first occurrence
//! counts.

use regex::Regex;
use std::sync::LazyLock;

static CLOSING_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(close[sd]?|fix(e[sd])?|resolve[sd]?)\s+#(\d+)")
        .expect("closing keyword pattern is valid")
});

/// The work item id referenced by the first closing keyword in `text`,
/// if any.
pub fn closing_reference(text: &str) -> Option<String> {
    CLOSING_KEYWORD
        .captures(text)
        .and_then(|caps| caps.get(3))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closes_matches() {
        assert_eq!(closing_reference("Closes #10"), Some("10".to_string()));
    }

    #[test]
    fn fixes_matches() {
        assert_eq!(closing_reference("fixes #25"), Some("25".to_string()));
    }

    #[test]
    fn resolved_matches_case_insensitively() {
        assert_eq!(
            closing_reference("RESOLVED #3 earlier today"),
            Some("3".to_string())
        );
    }

    #[test]
    fn plain_description_does_not_match() {
        assert_eq!(closing_reference("Just a description"), None);
    }

    #[test]
    fn first_occurrence_wins() {
        assert_eq!(
            closing_reference("fix #1 and also closes #2"),
            Some("1".to_string())
        );
    }

    #[test]
    fn keyword_requires_hash_number() {
        assert_eq!(closing_reference("closes the gap"), None);
        assert_eq!(closing_reference("fixes #"), None);
    }
}
