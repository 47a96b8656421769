//! Shared utility functions

/// Truncate a string to a maximum length, appending "..." if truncated.
/// Handles multi-byte characters by finding a valid char boundary.
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let suffix = "...";
    let target = max_len.saturating_sub(suffix.len());
    let mut end = target;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{}", &s[..end], suffix)
}

/// Parse a registry code, tolerating surrounding whitespace.
///
/// Returns `Ok(None)` for an empty field so callers can distinguish "absent"
/// from "malformed".
pub fn parse_code(raw: &str) -> Result<Option<i64>, std::num::ParseIntError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed.parse::<i64>().map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_string_untouched() {
        assert_eq!(truncate_str("short", 10), "short");
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        // "Žďár" is 7 bytes; cutting at 4 would split 'ď'
        let out = truncate_str("Žďár nad Sázavou", 7);
        assert!(out.ends_with("..."));
        assert!(out.len() <= 7);
    }

    #[test]
    fn test_parse_code() {
        assert_eq!(parse_code("").unwrap(), None);
        assert_eq!(parse_code("  ").unwrap(), None);
        assert_eq!(parse_code(" 500123 ").unwrap(), Some(500123));
        assert!(parse_code("12a").is_err());
    }
}
