//! Logging helpers for untrusted text (message bodies, node names, templates).
//! Everything that reaches the log file goes through [`escape_log`] so one record
//! stays on one line no matter what a remote node sends us.

/// Escape a string for single-line logging:
/// - `\n` => `\\n`
/// - `\r` => `\\r`
/// - `\t` => `\\t`
/// - backslash => `\\\\`
/// - other control characters => `\xNN`
///
/// Strings longer than 300 characters are cut with an ellipsis.
pub fn escape_log(s: &str) -> String {
    const MAX_PREVIEW: usize = 300;
    let mut out = String::with_capacity(s.len().min(MAX_PREVIEW) + 8);
    for (count, ch) in s.chars().enumerate() {
        if count >= MAX_PREVIEW {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                use std::fmt::Write;
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// Escape and shorten `input` to at most `max_bytes` of source text, never splitting
/// a multi-byte character. Truncated output ends in `...`.
pub fn truncate_for_log(input: &str, max_bytes: usize) -> String {
    if input.len() <= max_bytes {
        return escape_log(input);
    }
    let mut cut = max_bytes.saturating_sub(3);
    while cut > 0 && !input.is_char_boundary(cut) {
        cut -= 1;
    }
    let mut out = escape_log(&input[..cut]);
    out.push_str("...");
    out
}

/// Lowercase hex preview of the first `max` bytes of a frame.
pub fn hex_snippet(data: &[u8], max: usize) -> String {
    data.iter()
        .take(max)
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_newlines_and_tabs() {
        assert_eq!(escape_log("ping\nfrom\r\tme"), "ping\\nfrom\\r\\tme");
    }

    #[test]
    fn escapes_other_control_chars_as_hex() {
        assert_eq!(escape_log("a\u{7}b"), "a\\x07b");
    }

    #[test]
    fn truncate_does_not_split_multibyte_char() {
        // "—" is 3 bytes; a cut at byte 7 would land inside it
        let s = "12345—7890";
        assert_eq!(truncate_for_log(s, 10), "12345...");
    }

    #[test]
    fn truncate_keeps_short_input() {
        assert_eq!(truncate_for_log("pong", 10), "pong");
    }

    #[test]
    fn hex_snippet_limits_length() {
        assert_eq!(hex_snippet(&[0x94, 0xc3, 0x00, 0x05], 2), "94c3");
    }
}
