//! ANSI escape code handling utilities
//!
//! Server output and the log tagger both emit SGR color sequences. Tests and
//! the file log compare plain text, so the decoration is stripped here.

use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

/// Regex pattern for ANSI escape sequences.
///
/// Covers:
/// - CSI sequences: ESC [ ... letter (colors, cursor, etc.)
/// - OSC sequences: ESC ] ... BEL or ST (hyperlinks, titles)
/// - Simple escapes: ESC letter
static ANSI_ESCAPE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        \x1b\[[0-9;?]*[A-Za-z]               # CSI sequences
        | \x1b\][^\x07\x1b]*(?:\x07|\x1b\\)  # OSC sequences
        | \x1b[A-Za-z]                       # Simple escapes
        ",
    )
    .expect("ANSI regex pattern is valid")
});

/// Strip all ANSI escape sequences from a string.
///
/// # Examples
///
/// ```
/// use sdemon_core::strip_ansi_codes;
///
/// let input = "\x1b[34m[SERVER]\x1b[39m: listening";
/// assert_eq!(strip_ansi_codes(input), "[SERVER]: listening");
/// ```
pub fn strip_ansi_codes(input: &str) -> String {
    ANSI_ESCAPE_PATTERN.replace_all(input, "").into_owned()
}

/// Check if a string contains ANSI escape sequences.
pub fn contains_ansi_codes(input: &str) -> bool {
    ANSI_ESCAPE_PATTERN.is_match(input)
}

/// Like [`strip_ansi_codes`], but borrows when there is nothing to strip.
///
/// Used for server output copied into the file log.
pub fn without_ansi_codes(input: &str) -> Cow<'_, str> {
    if contains_ansi_codes(input) {
        Cow::Owned(strip_ansi_codes(input))
    } else {
        Cow::Borrowed(input)
    }
}
