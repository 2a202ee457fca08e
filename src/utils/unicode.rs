//! Unicode-safe helpers for working with UTF-8 strings.

use unicode_width::UnicodeWidthChar;

/// Convert a character index (0-based) to a byte index in the given string.
/// If `n` exceeds the number of characters, returns `s.len()`.
pub fn char_to_byte_index(s: &str, n: usize) -> usize {
    match s.char_indices().nth(n) {
        Some((i, _)) => i,
        None => s.len(),
    }
}

/// Terminal cell width of the first `n` characters of `s`.
pub fn display_width(s: &str, n: usize) -> usize {
    s.chars().take(n).map(|c| c.width().unwrap_or(0)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_to_byte_index() {
        assert_eq!(char_to_byte_index("héllo", 2), 3);
        assert_eq!(char_to_byte_index("abc", 10), 3);
    }

    #[test]
    fn test_display_width() {
        assert_eq!(display_width("ab", 2), 2);
        assert_eq!(display_width("日本語", 2), 4);
        assert_eq!(display_width("abc", 0), 0);
    }
}
