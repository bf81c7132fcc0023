//! Turning video and page titles into file names that are valid everywhere.

use std::sync::LazyLock;

use regex::Regex;

/// Longest file name, in bytes, accepted by common filesystems.
const MAX_NAME_BYTES: usize = 255;

static ILLEGAL_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[/\\?<>:*|"\x00-\x1f\x7f-\x9f]"#).unwrap());

static RESERVED_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:con|prn|aux|nul|com[0-9]|lpt[0-9])(?:\..*)?$").unwrap()
});

/// Strip everything a file name may not contain on Windows, macOS or Linux.
///
/// Illegal and control characters are dropped rather than replaced, trailing
/// dots and spaces are trimmed, device names (`CON`, `lpt1.txt`, ...) and
/// dot-only names become empty, and the result is cut to 255 bytes on a
/// character boundary. May return an empty string.
pub fn sanitize_filename(input: &str) -> String {
    let cleaned = ILLEGAL_CHARS.replace_all(input, "");
    let cleaned = truncate_bytes(&cleaned, MAX_NAME_BYTES).trim_end_matches(['.', ' ']);

    if RESERVED_NAME.is_match(cleaned) {
        return String::new();
    }

    cleaned.to_string()
}

fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
