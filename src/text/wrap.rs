//! Word wrapping and slugs.

use regex::Regex;
use std::sync::LazyLock;

/// Default terminal line width for [`pretty_print`].
pub const DEFAULT_LINE_LENGTH: usize = 100;

static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\n+").expect("Invalid paragraph regex"));

static NON_SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("Invalid slug regex"));

/// Wrap `message` at `line_length`, keeping paragraph breaks.
pub fn pretty_print(message: &str, line_length: usize) -> String {
    let line_length = line_length.max(1);
    let Ok(line) = Regex::new(&format!(r".{{1,{line_length}}}(?:\s+|$)")) else {
        return message.to_string();
    };

    PARAGRAPH_BREAK
        .split(message.trim())
        .map(|paragraph| {
            line.find_iter(paragraph.trim())
                .map(|m| m.as_str().trim())
                .filter(|l| !l.is_empty())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Lowercase `text` and collapse every non-alphanumeric run into one `-`.
pub fn slugify(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    NON_SLUG
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}
