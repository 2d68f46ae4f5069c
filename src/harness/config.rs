//! Multi-turn case configuration, as read from a test-case file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The `multi_turn` block of a test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiTurnConfig {
    /// Template variable that receives the rendered history.
    #[serde(default = "default_history_variable")]
    pub history_variable: String,

    #[serde(default = "default_max_turns")]
    pub max_turns: u32,

    /// Agent tool that ends the conversation.
    #[serde(default = "default_finish_tool")]
    pub finish_tool: String,

    /// Output budget per model call; falls back to the case budget, then 512.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_turn_max_tokens: Option<u32>,

    /// Pre-rendered history blocks shown before the first turn.
    pub initial_turns: Vec<String>,

    pub simulated_observations: SimulatedObservations,

    pub requirements: Requirements,

    /// Failed attempts allowed per turn, counting the first.
    #[serde(default = "default_format_retry_limit")]
    pub format_retry_limit: u32,

    /// Wall-clock budget for the whole conversation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline_seconds: Option<u64>,
}

impl Default for MultiTurnConfig {
    fn default() -> Self {
        Self {
            history_variable: default_history_variable(),
            max_turns: default_max_turns(),
            finish_tool: default_finish_tool(),
            per_turn_max_tokens: None,
            initial_turns: Vec::new(),
            simulated_observations: SimulatedObservations::default(),
            requirements: Requirements::default(),
            format_retry_limit: default_format_retry_limit(),
            deadline_seconds: None,
        }
    }
}

impl MultiTurnConfig {
    /// Per-turn budget after applying the fallbacks.
    pub fn turn_max_tokens(&self, case_max_tokens: Option<u32>) -> u32 {
        self.per_turn_max_tokens
            .or(case_max_tokens)
            .unwrap_or(DEFAULT_TURN_MAX_TOKENS)
    }
}

/// Per-turn budget when neither the config nor the case sets one.
pub const DEFAULT_TURN_MAX_TOKENS: u32 = 512;

/// Checks applied once the finish tool has been called.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Requirements {
    /// The first successful tool call must be `plan`.
    pub plan_first: bool,
    pub must_call_user_tools: Vec<String>,
    /// Case-insensitive substrings of the finish call's `summary`.
    pub finish_summary_keywords: Vec<String>,
}

impl Requirements {
    pub fn is_empty(&self) -> bool {
        !self.plan_first
            && self.must_call_user_tools.is_empty()
            && self.finish_summary_keywords.is_empty()
    }
}

/// Scripted observations keyed by agent tool.
///
/// ```json
/// {
///   "plan": "<observation>Plan noted for turn {turn}.</observation>",
///   "call_user_tool": {
///     "list_open_incidents": {"template": "<observation>{service}: 2 open</observation>"},
///     "default": "<observation>Tool {tool_name} ran.</observation>"
///   },
///   "default": "<observation>ok</observation>"
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatedObservations {
    /// Entries for user tools, keyed by `tool_name`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub call_user_tool: BTreeMap<String, ObservationEntry>,

    /// Entries for every other agent tool, plus `default`.
    #[serde(flatten)]
    pub tools: BTreeMap<String, ObservationEntry>,
}

/// An observation template, given inline or as an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObservationEntry {
    Text(String),
    Object {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        template: Option<String>,
    },
}

impl ObservationEntry {
    /// The template text; an empty `text` falls through to `template`.
    pub fn template(&self) -> Option<&str> {
        match self {
            ObservationEntry::Text(text) => Some(text),
            ObservationEntry::Object { text, template } => text
                .as_deref()
                .filter(|t| !t.is_empty())
                .or(template.as_deref()),
        }
    }
}

fn default_history_variable() -> String {
    "$HISTORY".to_string()
}

fn default_max_turns() -> u32 {
    6
}

fn default_finish_tool() -> String {
    "finish".to_string()
}

fn default_format_retry_limit() -> u32 {
    2
}
