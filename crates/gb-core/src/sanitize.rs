//! Text clean-up shared by the submission and moderation paths.

/// Keeps at most `max` characters (not bytes).
pub fn truncate_chars(input: &str, max: usize) -> &str {
    match input.char_indices().nth(max) {
        Some((idx, _)) => &input[..idx],
        None => input,
    }
}

pub fn char_len(input: &str) -> usize {
    input.chars().count()
}

/// Removes every `<...>` tag. A `<` with no closing `>` is kept as text.
pub fn strip_html_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(open) = rest.find('<') {
        match rest[open..].find('>') {
            Some(close) => {
                out.push_str(&rest[..open]);
                rest = &rest[open + close + 1..];
            }
            None => break,
        }
    }
    out.push_str(rest);
    out
}

/// Shortens a message for list previews, marking the cut with `...`.
pub fn preview(input: &str, max: usize) -> String {
    let cut = truncate_chars(input, max);
    if cut.len() < input.len() {
        format!("{cut}...")
    } else {
        cut.to_string()
    }
}

/// Escapes user text for the chat HTML subset.
pub fn escape(input: &str) -> String {
    html_escape::encode_text(input).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_on_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(char_len(truncate_chars(&"ü".repeat(1001), 1000)), 1000);
    }

    #[test]
    fn strips_tags() {
        assert_eq!(strip_html_tags("<script>hi</script>"), "hi");
        assert_eq!(strip_html_tags("<b>bold</b> and <i>it</i>"), "bold and it");
        assert_eq!(strip_html_tags("<<b>x"), "x");
        assert_eq!(strip_html_tags("<img src=x onerror=alert(1)>"), "");
    }

    #[test]
    fn unterminated_tag_is_kept() {
        assert_eq!(strip_html_tags("a < b"), "a < b");
        assert_eq!(strip_html_tags("<b>a</b> < c"), "a < c");
    }

    #[test]
    fn preview_marks_truncation() {
        assert_eq!(preview("short", 100), "short");
        assert_eq!(preview(&"x".repeat(101), 100), format!("{}...", "x".repeat(100)));
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape("<b>&"), "&lt;b&gt;&amp;");
    }
}
