//! Pure text utilities used by the generation pipeline and the harness.
//!
//! - **Tags**: extracting tag-delimited sections from model responses and
//!   cleaning the extracted template body
//! - **Placeholders**: collecting `{name}` placeholder names
//! - **Format**: `{name}` substitution with `{{`/`}}` escapes
//! - **Wrap**: terminal word wrapping and slugs for persisted prompts

mod format;
mod placeholders;
mod tags;
mod wrap;


pub use format::{FormatError, escape_braces, render_format};
pub use placeholders::extract_placeholder_names;
pub use tags::{
    extract_between_tags, extract_template_body, remove_empty_tags,
    strip_trailing_filler_sentence,
};
pub use wrap::{DEFAULT_LINE_LENGTH, pretty_print, slugify};
