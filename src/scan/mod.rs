//! Minimal tag scanner and floating-variable detection.
//!
//! The markup in generated templates is deliberately not general XML, so
//! this scanner only tracks which tag names are open at a given offset:
//!
//! - `<name>` opens `name`, where `name` is everything up to the next `>`
//!   (attributes and a trailing `/` are part of the name)
//! - `</name>` closes `name` if it is open; stray closers are ignored
//!
//! Callers go through [`open_tags_at`] or [`find_floating_variables`] only,
//! so a real XML reader can replace [`TagScanner`] later.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static STRICT_VARIABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\$[A-Z0-9_]+\}").expect("Invalid variable regex"));

/// Incremental left-to-right tag tracker.
///
/// `advance_to` may be called with increasing offsets; the result for each
/// offset matches scanning `text[..offset]` from scratch. A tag whose `>`
/// lies beyond the requested offset is applied provisionally (its name cut
/// at the offset) and re-read on the next call.
#[derive(Debug)]
pub struct TagScanner<'a> {
    text: &'a str,
    pos: usize,
    open: BTreeSet<String>,
}

impl<'a> TagScanner<'a> {
    /// Create a scanner positioned at the start of `text`.
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            pos: 0,
            open: BTreeSet::new(),
        }
    }

    /// Return the set of open tags at byte `offset`.
    ///
    /// `offset` is clamped to the text length and must lie on a char boundary.
    pub fn advance_to(&mut self, offset: usize) -> BTreeSet<String> {
        let end = offset.min(self.text.len());
        let bytes = self.text.as_bytes();

        while self.pos < end {
            if bytes[self.pos] != b'<' {
                self.pos += 1;
                continue;
            }

            let closing = self.pos + 1 < end && bytes[self.pos + 1] == b'/';
            let name_start = if closing { self.pos + 2 } else { self.pos + 1 };
            let window = &self.text[name_start.min(end)..end];

            match window.find('>') {
                Some(rel) => {
                    let name = &window[..rel];
                    apply(&mut self.open, name, closing);
                    self.pos = name_start + rel + 1;
                }
                None => {
                    // The tag runs past `end`; report it without consuming.
                    let mut open = self.open.clone();
                    apply(&mut open, window, closing);
                    return open;
                }
            }
        }

        self.open.clone()
    }
}

fn apply(open: &mut BTreeSet<String>, name: &str, closing: bool) {
    if closing {
        open.remove(name);
    } else {
        open.insert(name.to_string());
    }
}

/// Return the tag names open at byte `offset` of `text`.
pub fn open_tags_at(text: &str, offset: usize) -> BTreeSet<String> {
    TagScanner::new(text).advance_to(offset)
}

/// Find every `{$NAME}` occurrence that sits outside all open tags.
///
/// Occurrences are returned in document order with duplicates preserved:
/// each floating occurrence is reported to the cleanup pass separately.
pub fn find_floating_variables(template: &str) -> Vec<String> {
    let mut scanner = TagScanner::new(template);

    STRICT_VARIABLE
        .find_iter(template)
        .filter(|m| scanner.advance_to(m.start()).is_empty())
        .map(|m| m.as_str().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enclosed_and_floating_variables() {
        let template = "<complaint>{$X}</complaint> {$Y}";
        assert_eq!(find_floating_variables(template), vec!["{$Y}"]);
    }

    #[test]
    fn test_no_variables() {
        assert!(find_floating_variables("<a>plain</a> text").is_empty());
    }

    #[test]
    fn test_duplicates_are_preserved() {
        let template = "{$A} then <t>{$A}</t> then {$A}";
        assert_eq!(find_floating_variables(template), vec!["{$A}", "{$A}"]);
    }

    #[test]
    fn test_nested_tags_enclose() {
        let template = "<outer><inner></inner>{$A}</outer>{$B}";
        assert_eq!(find_floating_variables(template), vec!["{$B}"]);
    }

    #[test]
    fn test_only_strict_variables_are_considered() {
        let template = "{$lower} {NAME} {$OK_1}";
        assert_eq!(find_floating_variables(template), vec!["{$OK_1}"]);
    }

    #[test]
    fn test_stray_closing_tag_is_tolerated() {
        let template = "</nothing>{$A}";
        assert_eq!(find_floating_variables(template), vec!["{$A}"]);
    }

    #[test]
    fn test_attribute_tags_use_full_name() {
        // "<tool name=\"x\">" opens a tag named `tool name="x"`, which a
        // plain `</tool>` does not close.
        let template = "<tool name=\"x\">{$A}</tool>{$B}";
        assert!(find_floating_variables(template).is_empty());
    }

    #[test]
    fn test_self_closing_tag_stays_open() {
        let template = "<br/>{$A}";
        assert!(find_floating_variables(template).is_empty());
    }

    #[test]
    fn test_tag_spanning_variable_is_provisional() {
        // The `<` has no `>` before the variable, so the partial name counts
        // as open there, but the full tag is read for later occurrences.
        let template = "<a {$X}>text</a {$X}> {$Y}";
        assert_eq!(find_floating_variables(template), vec!["{$Y}"]);
    }

    #[test]
    fn test_open_tags_at_tracks_open_and_close() {
        let text = "<a><b>x</b>y</a>";
        let at_x = open_tags_at(text, text.find('x').unwrap());
        assert_eq!(at_x.into_iter().collect::<Vec<_>>(), vec!["a", "b"]);

        let at_y = open_tags_at(text, text.find('y').unwrap());
        assert_eq!(at_y.into_iter().collect::<Vec<_>>(), vec!["a"]);

        assert!(open_tags_at(text, text.len()).is_empty());
    }

    #[test]
    fn test_incremental_scan_matches_fresh_scan() {
        let text = "<a>1<b 2>3</b 4>5</a><c";
        let mut scanner = TagScanner::new(text);
        for offset in 0..=text.len() {
            assert_eq!(
                scanner.advance_to(offset),
                open_tags_at(text, offset),
                "mismatch at offset {offset}"
            );
        }
    }

    #[test]
    fn test_trailing_angle_bracket_opens_empty_name() {
        let text = "x <{$A}";
        let open = open_tags_at(text, text.find('{').unwrap());
        assert!(open.contains(""));
        assert!(find_floating_variables(text).is_empty());
    }
}
