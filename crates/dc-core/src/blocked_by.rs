//! Blocked-by dependency metadata, carried as a trailing marker comment
//! inside free-text bodies:
//!
//! ```text
//! <!-- decree:blockedBy #12 #34 -->
//! ```
//!
//! The marker is always the last content in a body and is preceded by
//! exactly one blank line when the body is non-empty. Parsing uses an
//! explicit token grammar rather than a regex so malformed look-alikes
//! are rejected wholesale.
//!
//! Note: a marker with zero ids parses the same as no marker at all;
//! "no metadata" and "empty metadata" are indistinguishable on read.

const OPEN: &str = "<!--";
const CLOSE: &str = "-->";
const KEYWORD: &str = "decree:blockedBy";

/// Append a dependency marker to `body`. Returns `body` unchanged when
/// `ids` is empty. Any pre-existing marker is replaced.
pub fn format(body: &str, ids: &[String]) -> String {
    if ids.is_empty() {
        return body.to_string();
    }
    let tags: Vec<String> = ids.iter().map(|id| format!("#{}", id)).collect();
    let marker = format!("{} {} {} {}", OPEN, KEYWORD, tags.join(" "), CLOSE);
    let base = strip(body);
    if base.is_empty() {
        marker
    } else {
        format!("{}\n\n{}", base, marker)
    }
}

/// Extract the ids from a trailing marker, or an empty list when no
/// well-formed marker terminates the body.
pub fn parse(body: &str) -> Vec<String> {
    match trailing_marker(body) {
        Some((_, ids)) => ids,
        None => Vec::new(),
    }
}

/// Remove exactly one trailing marker together with up to two preceding
/// newlines, leaving all other content untouched.
pub fn strip(body: &str) -> String {
    let Some((start, _)) = trailing_marker(body) else {
        return body.to_string();
    };
    let mut head = &body[..start];
    for _ in 0..2 {
        if let Some(rest) = head.strip_suffix('\n') {
            head = rest;
        }
    }
    head.to_string()
}

/// Locate a well-formed marker at the very end of `body` (ignoring
/// trailing whitespace). Returns its byte offset and the ids it carries.
fn trailing_marker(body: &str) -> Option<(usize, Vec<String>)> {
    let trimmed = body.trim_end();
    if !trimmed.ends_with(CLOSE) {
        return None;
    }
    let start = trimmed.rfind(OPEN)?;
    let inner = trimmed[start + OPEN.len()..trimmed.len() - CLOSE.len()].trim();

    let mut tokens = inner.split_whitespace();
    if tokens.next() != Some(KEYWORD) {
        return None;
    }

    let mut ids = Vec::new();
    for token in tokens {
        let digits = token.strip_prefix('#')?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        ids.push(digits.to_string());
    }
    Some((start, ids))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn format_appends_after_one_blank_line() {
        let out = format("Fix the widget", &ids(&["12", "34"]));
        assert_eq!(out, "Fix the widget\n\n<!-- decree:blockedBy #12 #34 -->");
    }

    #[test]
    fn format_on_empty_body_is_just_the_marker() {
        let out = format("", &ids(&["7"]));
        assert_eq!(out, "<!-- decree:blockedBy #7 -->");
    }

    #[test]
    fn format_with_no_ids_returns_body_unchanged() {
        assert_eq!(format("unchanged", &[]), "unchanged");
        assert_eq!(format("", &[]), "");
    }

    #[test]
    fn format_replaces_an_existing_marker() {
        let first = format("body", &ids(&["1"]));
        let second = format(&first, &ids(&["2", "3"]));
        assert_eq!(second, "body\n\n<!-- decree:blockedBy #2 #3 -->");
    }

    #[test]
    fn parse_round_trips_format() {
        for case in [&["1"][..], &["10", "25", "3"][..]] {
            let encoded = format("Some body text.", &ids(case));
            assert_eq!(parse(&encoded), ids(case));
        }
    }

    #[test]
    fn parse_without_marker_is_empty() {
        assert!(parse("nothing to see").is_empty());
        assert!(parse("").is_empty());
    }

    #[test]
    fn parse_marker_with_zero_ids_is_empty() {
        assert!(parse("body\n\n<!-- decree:blockedBy -->").is_empty());
    }

    #[test]
    fn parse_rejects_malformed_tokens() {
        assert!(parse("body\n\n<!-- decree:blockedBy #12a -->").is_empty());
        assert!(parse("body\n\n<!-- decree:blockedBy 12 -->").is_empty());
        assert!(parse("body\n\n<!-- decree:somethingElse #12 -->").is_empty());
    }

    #[test]
    fn parse_ignores_marker_in_the_middle() {
        let body = "<!-- decree:blockedBy #1 -->\ntrailing prose";
        assert!(parse(body).is_empty());
    }

    #[test]
    fn strip_round_trips_format() {
        let body = "A body.\n\nWith two paragraphs.";
        let encoded = format(body, &ids(&["5"]));
        assert_eq!(strip(&encoded), body);
    }

    #[test]
    fn strip_without_marker_is_identity() {
        let body = "Nothing here.\n";
        assert_eq!(strip(body), body);
    }

    #[test]
    fn strip_removes_at_most_two_newlines() {
        let encoded = "body\n\n\n<!-- decree:blockedBy #1 -->";
        assert_eq!(strip(encoded), "body\n");
    }

    #[test]
    fn html_comments_elsewhere_survive_strip() {
        let body = "intro <!-- keep me --> outro";
        let encoded = format(body, &ids(&["9"]));
        assert_eq!(strip(&encoded), body);
    }
}
