//! Text cleanup for values scraped from the page.

/// UI chrome that shows up inside scraped text nodes.
const BOILERPLATE: &[&str] = &[
    "…see more",
    "...see more",
    "Show more",
    "Show less",
    "See more",
    "See less",
    "About the job",
    "Promoted",
    "Actively recruiting",
];

/// Collapse runs of whitespace into single spaces and trim.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove UI boilerplate phrases.
pub fn strip_boilerplate(s: &str) -> String {
    let mut out = s.to_string();
    for phrase in BOILERPLATE {
        if out.contains(phrase) {
            out = out.replace(phrase, " ");
        }
    }
    out
}

/// Sanitize a scraped value: strip boilerplate, normalize whitespace.
///
/// Returns `None` when nothing meaningful is left.
pub fn clean_text(s: &str) -> Option<String> {
    let cleaned = normalize_whitespace(&strip_boilerplate(s));
    let cleaned = cleaned.trim_matches(|c: char| c == '·' || c == '•' || c.is_whitespace());
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

/// Truncate to at most `max_chars` characters (UTF-8 safe).
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text() {
        assert_eq!(
            clean_text("  Senior\n   Engineer \t"),
            Some("Senior Engineer".to_string())
        );
        assert_eq!(
            clean_text("Great team. …see more"),
            Some("Great team.".to_string())
        );
        assert_eq!(clean_text(" · Promoted "), None);
        assert_eq!(clean_text(""), None);
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }
}
