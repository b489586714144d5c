//! Terminal output sanitization
//!
//! Chat titles, topic labels and reflections come from user exports and model
//! output. Anything printed by the CLI goes through [`display_line`] so embedded
//! escape sequences cannot repaint the terminal and multi-line labels stay on
//! one row.

/// Strips ANSI CSI escape sequences and control characters (tab, newline and
/// carriage return are kept).
pub fn strip_ansi_codes(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            for next_ch in chars.by_ref() {
                if next_ch.is_ascii_alphabetic() {
                    break;
                }
            }
            continue;
        }

        if ch.is_control() && ch != '\t' && ch != '\n' && ch != '\r' {
            continue;
        }

        result.push(ch);
    }

    result
}

/// Sanitized single-line rendering, truncated to `max_chars` with an ellipsis
pub fn display_line(text: &str, max_chars: usize) -> String {
    let cleaned = strip_ansi_codes(text);
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }

    let mut truncated: String = collapsed.chars().take(max_chars.saturating_sub(1)).collect();
    truncated.push('…');
    truncated
}
