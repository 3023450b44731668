//! Strips Markdown down to plain text via an ordered sequence of regex
//! substitutions, the same shape as a single-responsibility transform block
//! -- grounded on the ordering the specification spells out, not on a
//! Markdown-to-HTML crate (this needs Markdown *to plain text*).

use regex::Regex;

fn strip_fenced_code(input: &str) -> String {
    let re = Regex::new(r"(?s)```[^\n]*\n?(.*?)```").unwrap();
    re.replace_all(input, "$1").into_owned()
}

fn strip_inline_code(input: &str) -> String {
    let re = Regex::new(r"`([^`]*)`").unwrap();
    re.replace_all(input, "$1").into_owned()
}

fn strip_images(input: &str) -> String {
    let re = Regex::new(r"!\[([^\]]*)\]\([^)]*\)").unwrap();
    re.replace_all(input, "$1").into_owned()
}

fn strip_links(input: &str) -> String {
    let re = Regex::new(r"\[([^\]]*)\]\([^)]*\)").unwrap();
    re.replace_all(input, "$1").into_owned()
}

fn strip_atx_headings(input: &str) -> String {
    let re = Regex::new(r"(?m)^#{1,6}\s+").unwrap();
    re.replace_all(input, "").into_owned()
}

fn strip_bold(input: &str) -> String {
    let re = Regex::new(r"\*\*([^*]+)\*\*|__([^_]+)__").unwrap();
    re.replace_all(input, |caps: &regex::Captures| {
        caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str().to_string()).unwrap_or_default()
    })
    .into_owned()
}

fn strip_italic(input: &str) -> String {
    let re = Regex::new(r"\*([^*]+)\*|_([^_]+)_").unwrap();
    re.replace_all(input, |caps: &regex::Captures| {
        caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str().to_string()).unwrap_or_default()
    })
    .into_owned()
}

fn strip_strikethrough(input: &str) -> String {
    let re = Regex::new(r"~~([^~]+)~~").unwrap();
    re.replace_all(input, "$1").into_owned()
}

fn strip_blockquotes(input: &str) -> String {
    let re = Regex::new(r"(?m)^>\s?").unwrap();
    re.replace_all(input, "").into_owned()
}

fn strip_list_markers(input: &str) -> String {
    let re = Regex::new(r"(?m)^\s*([-*+]|\d+\.)\s+").unwrap();
    re.replace_all(input, "").into_owned()
}

fn strip_horizontal_rules(input: &str) -> String {
    let re = Regex::new(r"(?m)^\s*([-*_])(\s*\1){2,}\s*$").unwrap();
    re.replace_all(input, "").into_owned()
}

fn strip_html_tags(input: &str) -> String {
    let re = Regex::new(r"<[^>]+>").unwrap();
    re.replace_all(input, "").into_owned()
}

fn unescape_backslashes(input: &str) -> String {
    let re = Regex::new(r"\\(.)").unwrap();
    re.replace_all(input, "$1").into_owned()
}

fn collapse_blank_lines(input: &str) -> String {
    let re = Regex::new(r"\n{3,}").unwrap();
    re.replace_all(input, "\n\n").into_owned()
}

/// Applies every transformation in the order the specification lists them,
/// then trims the result. Idempotent once normalized: a second pass over
/// already-stripped text is a no-op.
pub fn md_to_text(input: &str) -> String {
    let mut text = input.to_string();
    text = strip_fenced_code(&text);
    text = strip_inline_code(&text);
    text = strip_images(&text);
    text = strip_links(&text);
    text = strip_atx_headings(&text);
    text = strip_bold(&text);
    text = strip_italic(&text);
    text = strip_strikethrough(&text);
    text = strip_blockquotes(&text);
    text = strip_list_markers(&text);
    text = strip_horizontal_rules(&text);
    text = strip_html_tags(&text);
    text = unescape_backslashes(&text);
    text = collapse_blank_lines(&text);
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_headings_bold_and_links() {
        let input = "# Title\n\nThis is **bold** and [a link](http://x).";
        let out = md_to_text(input);
        assert_eq!(out, "Title\n\nThis is bold and a link.");
    }

    #[test]
    fn strips_fenced_code_and_keeps_content() {
        let input = "```rust\nlet x = 1;\n```";
        let out = md_to_text(input);
        assert_eq!(out, "let x = 1;");
    }

    #[test]
    fn is_idempotent_after_normalization() {
        let input = "# Title\n\n- one\n- two\n\n**bold**";
        let once = md_to_text(input);
        let twice = md_to_text(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn collapses_excess_blank_lines() {
        let input = "a\n\n\n\n\nb";
        assert_eq!(md_to_text(input), "a\n\nb");
    }
}
