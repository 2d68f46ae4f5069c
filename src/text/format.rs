//! Named-field format rendering with `str.format` rules.
//!
//! Scripted harness observations are written in this syntax and rendered
//! against the fields of a parsed tool call.
//!
//! ```text
//! {name}            value of `name`
//! {name!r}          conversion: `s` (as-is), `r` (quoted repr), `a` (ASCII repr)
//! {name:>12.4}      string spec: [[fill]align][0][width][.precision][s]
//! {{  }}            literal braces
//! ```
//!
//! Only named fields exist: `{}` and `{0}` are positional and rejected, as are
//! attribute and index lookups. A `}` that is not doubled is an error.

use std::collections::BTreeMap;
use std::iter::Peekable;
use std::str::CharIndices;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("single '}}' encountered at position {position}")]
    SingleClosingBrace { position: usize },

    #[error("expected '}}' before end of string for field at position {position}")]
    UnclosedField { position: usize },

    #[error("positional field '{{{field}}}' at position {position}; only named fields are allowed")]
    PositionalField { field: String, position: usize },

    #[error("field '{field}' at position {position} uses attribute or index access")]
    UnsupportedField { field: String, position: usize },

    #[error("unknown conversion '!{conversion}' at position {position}")]
    InvalidConversion { conversion: String, position: usize },

    #[error("invalid format spec '{spec}' at position {position}")]
    InvalidSpec { spec: String, position: usize },

    /// The field parsed but `values` has no entry for it.
    #[error("undefined name '{name}' at position {position}")]
    UndefinedName { name: String, position: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conversion {
    Str,
    Repr,
    Ascii,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
    Center,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Spec {
    fill: char,
    align: Align,
    width: usize,
    precision: Option<usize>,
}

impl Default for Spec {
    fn default() -> Self {
        Self {
            fill: ' ',
            align: Align::Left,
            width: 0,
            precision: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field {
        name: String,
        conversion: Conversion,
        spec: Spec,
        position: usize,
    },
}

/// Render `template`, substituting each `{name}` field from `values`.
///
/// Substituted values are inserted verbatim and never re-scanned. The whole
/// template is parsed before any lookup, so syntax errors win over missing
/// names.
pub fn render_format(
    template: &str,
    values: &BTreeMap<String, String>,
) -> Result<String, FormatError> {
    let segments = parse(template)?;
    let mut out = String::with_capacity(template.len());

    for segment in segments {
        match segment {
            Segment::Literal(text) => out.push_str(&text),
            Segment::Field {
                name,
                conversion,
                spec,
                position,
            } => {
                let value = values
                    .get(&name)
                    .ok_or(FormatError::UndefinedName { name, position })?;
                let converted = match conversion {
                    Conversion::Str => value.clone(),
                    Conversion::Repr => repr(value, false),
                    Conversion::Ascii => repr(value, true),
                };
                out.push_str(&apply_spec(&converted, &spec));
            }
        }
    }

    Ok(out)
}

/// Double every brace so the value survives a later brace-aware pass.
pub fn escape_braces(value: &str) -> String {
    value.replace('{', "{{").replace('}', "}}")
}

fn parse(template: &str) -> Result<Vec<Segment>, FormatError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = template.char_indices().peekable();

    while let Some((position, ch)) = chars.next() {
        let next = chars.peek().map(|&(_, c)| c);
        match (ch, next) {
            ('{', Some('{')) | ('}', Some('}')) => {
                chars.next();
                literal.push(ch);
            }
            ('}', _) => return Err(FormatError::SingleClosingBrace { position }),
            ('{', _) => {
                let raw = take_field(&mut chars).ok_or(FormatError::UnclosedField { position })?;
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(parse_field(&raw, position)?);
            }
            _ => literal.push(ch),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

/// Consume up to the `}` closing the current field. Nested braces, as in a
/// spec like `{a:{w}}`, are balanced so the error names the real problem.
fn take_field(chars: &mut Peekable<CharIndices<'_>>) -> Option<String> {
    let mut raw = String::new();
    let mut depth = 0usize;

    for (_, ch) in chars.by_ref() {
        match ch {
            '}' if depth == 0 => return Some(raw),
            '}' => depth -= 1,
            '{' => depth += 1,
            _ => {}
        }
        raw.push(ch);
    }
    None
}

fn parse_field(raw: &str, position: usize) -> Result<Segment, FormatError> {
    let name_end = raw.find(['!', ':']).unwrap_or(raw.len());
    let (name, rest) = raw.split_at(name_end);

    if name.is_empty() || name.chars().all(|c| c.is_ascii_digit()) {
        return Err(FormatError::PositionalField {
            field: raw.to_string(),
            position,
        });
    }
    if name.contains(['.', '[']) {
        return Err(FormatError::UnsupportedField {
            field: name.to_string(),
            position,
        });
    }

    let (conversion, spec) = match rest.strip_prefix('!') {
        Some(after) => {
            let mut it = after.chars();
            let conversion = match (it.next(), it.as_str()) {
                (Some('s'), tail) if tail.is_empty() || tail.starts_with(':') => Conversion::Str,
                (Some('r'), tail) if tail.is_empty() || tail.starts_with(':') => Conversion::Repr,
                (Some('a'), tail) if tail.is_empty() || tail.starts_with(':') => Conversion::Ascii,
                _ => {
                    return Err(FormatError::InvalidConversion {
                        conversion: after.split(':').next().unwrap_or_default().to_string(),
                        position,
                    });
                }
            };
            (conversion, it.as_str().strip_prefix(':').unwrap_or_default())
        }
        None => (Conversion::Str, rest.strip_prefix(':').unwrap_or_default()),
    };

    Ok(Segment::Field {
        name: name.to_string(),
        conversion,
        spec: parse_spec(spec).ok_or_else(|| FormatError::InvalidSpec {
            spec: spec.to_string(),
            position,
        })?,
        position,
    })
}

fn align_of(c: char) -> Option<Align> {
    match c {
        '<' => Some(Align::Left),
        '>' => Some(Align::Right),
        '^' => Some(Align::Center),
        _ => None,
    }
}

/// String format spec; `None` when it holds anything strings reject.
fn parse_spec(spec: &str) -> Option<Spec> {
    let chars: Vec<char> = spec.chars().collect();
    let mut result = Spec::default();
    let mut i = 0;

    match (chars.first(), chars.get(1)) {
        (Some(&fill), Some(&a)) if align_of(a).is_some() => {
            result.fill = fill;
            result.align = align_of(a)?;
            i = 2;
        }
        (Some(&a), _) if align_of(a).is_some() => {
            result.align = align_of(a)?;
            i = 1;
        }
        _ => {
            if chars.first() == Some(&'0') {
                result.fill = '0';
            }
        }
    }

    let width_start = i;
    while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
        i += 1;
    }
    if i > width_start {
        result.width = chars[width_start..i].iter().collect::<String>().parse().ok()?;
    }

    if chars.get(i) == Some(&'.') {
        i += 1;
        let precision_start = i;
        while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
            i += 1;
        }
        if i == precision_start {
            return None;
        }
        result.precision = chars[precision_start..i]
            .iter()
            .collect::<String>()
            .parse()
            .ok();
    }

    if chars.get(i) == Some(&'s') {
        i += 1;
    }

    (i == chars.len()).then_some(result)
}

fn apply_spec(value: &str, spec: &Spec) -> String {
    let truncated: String = match spec.precision {
        Some(limit) => value.chars().take(limit).collect(),
        None => value.to_string(),
    };

    let len = truncated.chars().count();
    if len >= spec.width {
        return truncated;
    }

    let pad = spec.width - len;
    let (left, right) = match spec.align {
        Align::Left => (0, pad),
        Align::Right => (pad, 0),
        Align::Center => (pad / 2, pad - pad / 2),
    };
    let fill = |n: usize| spec.fill.to_string().repeat(n);
    format!("{}{}{}", fill(left), truncated, fill(right))
}

/// Quoted, escaped rendering of `value`; `ascii` also escapes non-ASCII.
fn repr(value: &str, ascii: bool) -> String {
    let quote = if value.contains('\'') && !value.contains('"') {
        '"'
    } else {
        '\''
    };

    let mut out = String::with_capacity(value.len() + 2);
    out.push(quote);
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c if ascii && !c.is_ascii() => {
                let code = c as u32;
                if code <= 0xff {
                    out.push_str(&format!("\\x{:02x}", code));
                } else if code <= 0xffff {
                    out.push_str(&format!("\\u{:04x}", code));
                } else {
                    out.push_str(&format!("\\U{:08x}", code));
                }
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}
