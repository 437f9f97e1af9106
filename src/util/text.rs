// src/util/text.rs

/// First non-empty line of `text`, trimmed.
///
/// # Examples
///
/// ```
/// use noteflow::util::text::first_line;
///
/// assert_eq!(first_line("\n  Groceries \nmilk, eggs"), "Groceries");
/// ```
pub fn first_line(text: &str) -> &str {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("")
}

/// Shorten `text` to at most `max_chars` characters, marking the cut with `…`.
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }

    let mut out: String = text.chars().take(max_chars - 1).collect();
    out.push('…');
    out
}

/// One-line summary of a possibly multi-line note.
pub fn summarize(text: &str, max_chars: usize) -> String {
    let line = first_line(text);
    let more = text.trim().lines().filter(|l| !l.trim().is_empty()).count() > 1;
    if more {
        truncate(&format!("{line} …"), max_chars)
    } else {
        truncate(line, max_chars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_multiline_text_when_extracting_first_line_then_returns_only_first_line() {
        assert_eq!(first_line("First line\nSecond line"), "First line");
    }

    #[test]
    fn given_leading_blank_lines_when_extracting_first_line_then_skips_them() {
        assert_eq!(first_line("\n\n  hello  \nworld"), "hello");
    }

    #[test]
    fn given_empty_text_when_extracting_first_line_then_returns_empty_string() {
        assert_eq!(first_line(""), "");
    }

    #[test]
    fn given_short_text_when_truncating_then_returns_unchanged() {
        assert_eq!(truncate("short", 10), "short");
    }

    #[test]
    fn given_long_text_when_truncating_then_appends_ellipsis() {
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
    }

    #[test]
    fn given_multibyte_text_when_truncating_then_counts_chars() {
        assert_eq!(truncate("ääääää", 3), "ää…");
    }

    #[test]
    fn given_multiline_note_when_summarizing_then_marks_continuation() {
        assert_eq!(summarize("Groceries\nmilk", 40), "Groceries …");
    }

    #[test]
    fn given_single_line_note_when_summarizing_then_returns_line() {
        assert_eq!(summarize("  Call Bob  ", 40), "Call Bob");
    }
}
