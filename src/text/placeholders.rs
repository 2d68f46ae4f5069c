//! Placeholder name extraction.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^}]+)\}").expect("Invalid placeholder regex"));

/// Collect the names inside single-brace placeholders, sorted and deduplicated.
///
/// Any `{…}` token counts, not only the strict `{$NAME}` form: the result is
/// used both to list template variables and to detect unfilled leftovers.
pub fn extract_placeholder_names(text: &str) -> BTreeSet<String> {
    PLACEHOLDER
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect()
}
