//! Text processing utilities.

/// Minimum non-whitespace characters for meaningful content.
pub const MIN_CONTENT_LENGTH: usize = 20;

/// Check if content has meaningful text (not just whitespace/punctuation).
pub fn has_meaningful_content(content: &str) -> bool {
    content.chars().filter(|c| !c.is_whitespace()).count() >= MIN_CONTENT_LENGTH
}
