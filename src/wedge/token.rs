//! # Token Module
//!
//! Extracts the numeric reading from a received line.

use std::sync::LazyLock;

use regex::Regex;

use crate::serial::RawLine;

/// Optional sign, ASCII digits, a mandatory decimal point, ASCII digits.
static NUMERIC_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?[0-9]*\.[0-9]*").expect("Invalid regex pattern"));

/// Finds the numeric token in `text`.
///
/// All whitespace is removed first, so `"1 2 . 3 4"` reads as `12.34`. Only the
/// leftmost match is returned. A line without a `.`, or whose leftmost match
/// has no ASCII digit (a stray `.` or `-.`), has no token.
///
/// # Examples
///
/// ```
/// use serial_wedge::wedge::token::extract_token;
///
/// assert_eq!(extract_token("ST,GS,  -45.6 g\r\n").as_deref(), Some("-45.6"));
/// assert_eq!(extract_token("1234"), None);
/// ```
#[must_use]
pub fn extract_token(text: &str) -> Option<String> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    NUMERIC_PATTERN
        .find(&compact)
        .map(|m| m.as_str())
        .filter(|token| token.bytes().any(|b| b.is_ascii_digit()))
        .map(str::to_string)
}

/// [`extract_token`] over a raw line; `None` for empty lines.
#[must_use]
pub fn token_from_line(line: &RawLine) -> Option<String> {
    if line.is_empty() {
        return None;
    }
    extract_token(&line.to_text())
}
