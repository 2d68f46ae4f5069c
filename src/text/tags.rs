//! Tag-delimited extraction and template body cleanup.

use crate::error::{ForgeError, Result};
use regex::{Regex, RegexBuilder};
use std::sync::LazyLock;

/// Number of leading characters of an `<Instructions>` block kept verbatim.
pub const TEMPLATE_HEAD_CHARS: usize = 1000;

static EMPTY_TAG_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\n<(\w+)>\s*</(\w+)>\n").expect("Invalid empty tag pair regex")
});

/// Return the inner text of every `<tag>…</tag>` pair, in document order.
///
/// Matching is case-insensitive, spans newlines and is non-greedy, so
/// repeated blocks are returned separately rather than merged.
pub fn extract_between_tags(tag: &str, text: &str) -> Vec<String> {
    let tag = regex::escape(tag);
    let pattern = format!("<{tag}>(.+?)</{tag}>");
    let Ok(re) = RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
    else {
        return Vec::new();
    };

    re.captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Remove line-isolated empty tag pairs such as `\n<notes>  </notes>\n`.
///
/// Both tag names must match. The surrounding newlines are removed with the
/// pair, so a single pass can expose a new empty pair; callers that need a
/// fixpoint apply it repeatedly.
pub fn remove_empty_tags(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut copied_up_to = 0;
    let mut search_from = 0;

    while let Some(caps) = EMPTY_TAG_PAIR.captures_at(text, search_from) {
        let Some(whole) = caps.get(0) else {
            break;
        };
        if caps[1] == caps[2] {
            result.push_str(&text[copied_up_to..whole.start()]);
            copied_up_to = whole.end();
            search_from = whole.end();
        } else {
            // Mismatched names: retry just past the leading newline so a pair
            // starting inside this match is still found.
            search_from = whole.start() + 1;
        }
    }

    result.push_str(&text[copied_up_to..]);
    result
}

/// Drop a trailing sentence that starts with "Let me know".
///
/// Sentences are split on the literal `". "`. When the last one is filler it
/// is removed and a final period restored if the remainder lost it.
pub fn strip_trailing_filler_sentence(text: &str) -> String {
    let mut sentences: Vec<&str> = text.split(". ").collect();
    match sentences.last() {
        Some(last) if last.starts_with("Let me know") => {
            sentences.pop();
            let mut result = sentences.join(". ");
            if !result.is_empty() && !result.ends_with('.') {
                result.push('.');
            }
            result
        }
        _ => text.to_string(),
    }
}

/// Extract the template body from a metaprompt response.
///
/// Takes the first `<Instructions>` block. The first
/// [`TEMPLATE_HEAD_CHARS`] characters are kept verbatim; the remainder gets
/// empty-tag removal (twice) and trailing filler stripping.
pub fn extract_template_body(response: &str) -> Result<String> {
    let instructions = extract_between_tags("Instructions", response)
        .into_iter()
        .next()
        .ok_or_else(|| {
            ForgeError::Extraction(
                "metaprompt response does not contain an <Instructions> block".to_string(),
            )
        })?;

    let split_at = instructions
        .char_indices()
        .nth(TEMPLATE_HEAD_CHARS)
        .map(|(idx, _)| idx)
        .unwrap_or(instructions.len());
    let (head, tail) = instructions.split_at(split_at);

    let once = remove_empty_tags(tail);
    let twice = remove_empty_tags(once.trim());
    let cleaned_tail = strip_trailing_filler_sentence(twice.trim());

    Ok(format!("{head}{cleaned_tail}"))
}
