//! Post-conversation requirement checks.

use super::ConversationTurn;
use super::config::Requirements;
use super::tool_call::ToolCall;
use crate::error::{ForgeError, Result};

/// Tool the agent is expected to open with when `plan_first` is set.
pub const PLAN_TOOL: &str = "plan";

/// Check `requirements` against a finished conversation.
///
/// Checks run in order (plan first, user tools, summary keywords) and the
/// first failure is reported.
pub fn check_requirements(
    requirements: &Requirements,
    conversation: &[ConversationTurn],
    used_user_tools: &[String],
    finish_call: Option<&ToolCall>,
) -> Result<()> {
    if requirements.plan_first {
        let first = conversation.iter().find_map(|turn| turn.tool_call.as_ref());
        if first.is_none_or(|call| call.name != PLAN_TOOL) {
            return Err(ForgeError::Requirement(
                "The first turn must invoke the plan tool.".to_string(),
            ));
        }
    }

    let mut missing_tools: Vec<&str> = requirements
        .must_call_user_tools
        .iter()
        .filter(|tool| !used_user_tools.contains(*tool))
        .map(String::as_str)
        .collect();
    if !missing_tools.is_empty() {
        missing_tools.sort_unstable();
        return Err(ForgeError::Requirement(format!(
            "The conversation never invoked the required user tools: {}",
            missing_tools.join(", ")
        )));
    }

    if !requirements.finish_summary_keywords.is_empty() {
        let summary = finish_call
            .and_then(|call| call.fields.get("summary"))
            .map(|s| s.to_lowercase())
            .unwrap_or_default();

        let mut missing_keywords: Vec<&str> = requirements
            .finish_summary_keywords
            .iter()
            .filter(|kw| !summary.contains(&kw.to_lowercase()))
            .map(String::as_str)
            .collect();
        if !missing_keywords.is_empty() {
            missing_keywords.sort_unstable();
            return Err(ForgeError::Requirement(format!(
                "Finish summary missing required keywords: {}",
                missing_keywords.join(", ")
            )));
        }
    }

    Ok(())
}
