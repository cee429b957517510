//! UTF-8 safe string preview helpers.
//!
//! Model replies and transcripts routinely contain multibyte characters, so
//! previews are cut by `char` rather than by byte index.

/// Return the first `n` characters of `s` as a `String` (no ellipsis).
pub fn prefix_chars(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

/// Return a preview of `s` up to `n` characters. If `s` is longer than `n`
/// characters, the returned string will include a trailing ellipsis `...`.
pub fn preview(s: &str, n: usize) -> String {
    let mut prefix = prefix_chars(s, n);
    if s.chars().nth(n).is_some() {
        prefix.push_str("...");
    }
    prefix
}

/// Single-line preview: whitespace runs (including newlines) collapse to one
/// space before truncating. Used when echoing model output into errors and logs.
pub fn one_line_preview(s: &str, n: usize) -> String {
    let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");
    preview(&collapsed, n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_basic_ascii() {
        let s = "hello world";
        assert_eq!(preview(s, 5), "hello...");
        assert_eq!(preview(s, 20), "hello world");
        assert_eq!(preview(s, 11), "hello world");
    }

    #[test]
    fn preview_multibyte_characters() {
        let s = "résumé über naïve café";
        let p = preview(s, 6);
        assert_eq!(p, "résumé...");
    }

    #[test]
    fn one_line_preview_collapses_newlines() {
        let s = "line one\n\n   line two\tend";
        assert_eq!(one_line_preview(s, 100), "line one line two end");
        assert_eq!(one_line_preview(s, 8), "line one...");
    }

    #[test]
    fn empty_input() {
        assert_eq!(preview("", 5), "");
        assert_eq!(one_line_preview("   ", 5), "");
    }
}
