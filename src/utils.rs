//! Small string helpers shared across the service: slug derivation for
//! category URLs, excerpt derivation for list views, and log-safe
//! truncation of provider payloads.

/// Convert a category or article name to a URL-friendly slug.
///
/// Lowercases the text, removes special characters, replaces spaces with
/// hyphens, and trims hyphens from the ends. May return an empty string
/// (e.g. for all-punctuation input); callers that need a non-empty slug
/// must supply their own fallback.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(slugify("World News"), "world-news");
/// assert_eq!(slugify("Tech!"), "tech");
/// ```
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .replace(|c: char| !c.is_alphanumeric() && c != ' ' && c != '-', "")
        .replace(' ', "-")
        .trim_matches('-')
        .to_string()
}

/// Derive a short excerpt from an article body.
///
/// Returns the body unchanged when it fits within `max_chars`; otherwise
/// cuts on the last word boundary before the limit and appends an ellipsis.
pub fn excerpt(body: &str, max_chars: usize) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let mut cut: String = trimmed.chars().take(max_chars).collect();
    if let Some(idx) = cut.rfind(char::is_whitespace) {
        cut.truncate(idx);
    }
    let cut = cut.trim_end_matches(|c: char| c.is_whitespace() || c == ',' || c == ';');
    format!("{cut}…")
}

/// Truncate a string for logging purposes.
///
/// Long provider payloads are truncated to `max` bytes with an ellipsis and
/// byte count indicator appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…(+{} bytes)", &s[..end], s.len() - end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("World News"), "world-news");
        assert_eq!(slugify("Tech"), "tech");
        assert_eq!(slugify("Special@#$Characters"), "specialcharacters");
        assert_eq!(slugify("-Entertainment-"), "entertainment");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_excerpt_short_body() {
        assert_eq!(excerpt("Short body.", 200), "Short body.");
    }

    #[test]
    fn test_excerpt_cuts_on_word_boundary() {
        let body = "word ".repeat(100);
        let cut = excerpt(&body, 200);
        assert!(cut.ends_with('…'));
        assert!(cut.chars().count() <= 201);
    }

    #[test]
    fn test_truncate_for_log_short_string() {
        assert_eq!(truncate_for_log("Hello, world!", 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }
}
