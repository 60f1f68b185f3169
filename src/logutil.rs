//! Logging helpers for the noisy side of the serial link.
//!
//! The camera interleaves boot messages and `printf` output with binary frame data, so
//! anything we echo into the log has to be squeezed onto one printable line first.

/// Render `s` on one log line, keeping at most `max_chars` characters.
///
/// Backslash, newline, carriage return and tab become their two-character escapes;
/// other control characters become `\xNN`. A cut-off preview ends in `…`.
pub fn escape_log(s: &str, max_chars: usize) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(s.len().min(max_chars) + 8);
    for (count, ch) in s.chars().enumerate() {
        if count >= max_chars {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// Space separated hex of at most `max` leading bytes, for trace dumps of raw chunks.
pub fn hex_snippet(data: &[u8], max: usize) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(data.len().min(max) * 3 + 4);
    for (i, b) in data.iter().take(max).enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(&mut out, "{:02X}", b);
    }
    if data.len() > max {
        out.push_str(" …");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_line_breaks_and_backslashes() {
        assert_eq!(
            escape_log("Line1\nLine2\r\tEnd\\", 64),
            "Line1\\nLine2\\r\\tEnd\\\\"
        );
    }

    #[test]
    fn escapes_other_control_chars() {
        assert_eq!(escape_log("a\u{1b}[0m", 64), "a\\x1B[0m");
    }

    #[test]
    fn preview_is_cut_at_the_limit() {
        assert_eq!(escape_log("[CAM] boot", 5), "[CAM]…");
        assert_eq!(escape_log("short", 5), "short");
    }

    #[test]
    fn hex_snippet_truncates() {
        assert_eq!(hex_snippet(&[0xFF, 0xD8, 0x00], 8), "FF D8 00");
        assert_eq!(hex_snippet(&[0xFF, 0xD8, 0x00], 2), "FF D8 …");
        assert_eq!(hex_snippet(&[], 4), "");
    }
}
