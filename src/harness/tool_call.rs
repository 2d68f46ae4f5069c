//! Parsing the single `<tool_call>` element a model turn must consist of.

use super::xml::parse_element;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use thiserror::Error;

/// Agent tool that dispatches to a user-defined tool named in `<tool_name>`.
pub const CALL_USER_TOOL: &str = "call_user_tool";

/// Fields whose content is free text and gets CDATA-wrapped before parsing,
/// so models can write `<`, `&` and the like inside them.
pub const TEXTUAL_FIELD_TAGS: [&str; 8] = [
    "summary",
    "handoff",
    "success_criteria",
    "status",
    "message",
    "audience",
    "open_questions",
    "next_action",
];

static TOOL_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<tool_call\b[^>]*>.*?</tool_call>").expect("Invalid tool call regex")
});

static TEXTUAL_FIELDS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    TEXTUAL_FIELD_TAGS
        .iter()
        .map(|tag| {
            let pattern = format!(r"(?s)<{tag}>(.*?)</{tag}>");
            (*tag, Regex::new(&pattern).expect("Invalid field regex"))
        })
        .collect()
});

/// Why a model turn was rejected. Messages are fed back to the model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolCallError {
    #[error("Response must contain a <tool_call> element.")]
    Missing,

    #[error("Response must contain exactly one <tool_call> element.")]
    Multiple,

    #[error("Response must not contain text before the <tool_call> element.")]
    TextBefore,

    #[error("Response must not contain text after the </tool_call> element.")]
    TextAfter,

    #[error("Tool call XML not well formed: {0}")]
    Malformed(String),

    #[error("tool_call element is missing the required 'name' attribute.")]
    MissingName,

    #[error("call_user_tool responses must include a <tool_name> element.")]
    MissingUserTool,
}

/// A parsed tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Agent tool invoked (the `name` attribute).
    pub name: String,
    /// The element as parsed, after CDATA wrapping.
    pub xml: String,
    /// Non-argument children: trimmed text, or serialized XML when nested.
    pub fields: BTreeMap<String, String>,
    /// Children of `<arguments>`, trimmed text.
    pub arguments: BTreeMap<String, String>,
    /// User tool for `call_user_tool`; empty otherwise.
    pub tool_name: String,
}

/// Wrap `text` in a CDATA section, splitting any embedded `]]>`.
pub fn wrap_cdata(text: &str) -> String {
    if text.is_empty() {
        return "<![CDATA[]]>".to_string();
    }
    format!("<![CDATA[{}]]>", text.replace("]]>", "]]]><![CDATA[>"))
}

/// CDATA-wrap the content of every textual field not already wrapped.
pub fn wrap_textual_fields(tool_xml: &str) -> String {
    let mut xml = tool_xml.to_string();

    for (tag, pattern) in TEXTUAL_FIELDS.iter() {
        xml = pattern
            .replace_all(&xml, |caps: &regex::Captures| {
                let whole = &caps[0];
                let content = &caps[1];
                if content.contains("<![CDATA[") {
                    whole.to_string()
                } else {
                    format!("<{tag}>{}</{tag}>", wrap_cdata(content))
                }
            })
            .into_owned();
    }

    xml
}

/// Parse `output` as exactly one tool call.
///
/// Leading and trailing whitespace is ignored. After the element only stray
/// `</tool_call>` closers are tolerated.
pub fn parse_tool_call(output: &str) -> Result<ToolCall, ToolCallError> {
    let cleaned = output.trim();

    let mut matches = TOOL_CALL.find_iter(cleaned);
    let Some(found) = matches.next() else {
        return Err(ToolCallError::Missing);
    };
    if matches.next().is_some() {
        return Err(ToolCallError::Multiple);
    }

    if !cleaned[..found.start()].trim().is_empty() {
        return Err(ToolCallError::TextBefore);
    }

    let suffix = cleaned[found.end()..].trim();
    if !suffix.is_empty() {
        if suffix.contains("<tool_call") {
            return Err(ToolCallError::Multiple);
        }
        if !suffix.replace("</tool_call>", "").trim().is_empty() {
            return Err(ToolCallError::TextAfter);
        }
    }

    let xml = wrap_textual_fields(found.as_str().trim());
    let element = parse_element(&xml).map_err(|e| ToolCallError::Malformed(e.to_string()))?;

    let name = match element.attribute("name") {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => return Err(ToolCallError::MissingName),
    };

    let mut fields = BTreeMap::new();
    let mut arguments = BTreeMap::new();

    for child in element.elements() {
        if child.name == "arguments" {
            for arg in child.elements() {
                arguments.insert(arg.name.clone(), arg.leading_text().trim().to_string());
            }
        } else if child.has_element_children() {
            fields.insert(child.name.clone(), child.to_xml());
        } else {
            fields.insert(child.name.clone(), child.leading_text().trim().to_string());
        }
    }

    let tool_name = fields
        .get("tool_name")
        .map(|value| value.trim().to_string())
        .unwrap_or_default();

    if name == CALL_USER_TOOL && tool_name.is_empty() {
        return Err(ToolCallError::MissingUserTool);
    }

    Ok(ToolCall {
        name,
        xml,
        fields,
        arguments,
        tool_name,
    })
}
