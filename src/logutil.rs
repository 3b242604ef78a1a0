//! Log sanitisation helpers.
//!
//! User-controlled strings (usernames, filenames, upload descriptions) go
//! through [`escape_log`] before they reach the log so multi-line or binary
//! input cannot break single-line log parsing.

/// Escape a string for single-line logging: `\n`, `\r`, `\t` and backslashes
/// are backslash-escaped, other control characters become `\xNN`, and input
/// longer than the preview cap is truncated with an ellipsis.
pub fn escape_log(s: &str) -> String {
    const MAX_PREVIEW: usize = 200;
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
