//! Scripted environment observations.

use super::config::{ObservationEntry, SimulatedObservations};
use super::tool_call::{CALL_USER_TOOL, ToolCall};
use crate::error::{ForgeError, Result};
use crate::text::{FormatError, escape_braces, render_format};
use std::collections::BTreeMap;

/// Shown when no scripted entry applies.
pub const NO_OBSERVATION: &str =
    r#"<observation role="system">No scripted observation available.</observation>"#;

const DEFAULT_KEY: &str = "default";

/// Pick the scripted entry for `call`.
///
/// `call_user_tool` tries the user-tool entry, the user-tool `default`, then
/// the global `default`. Other tools try their own entry, then the global
/// `default`.
pub fn find_entry<'a>(
    call: &ToolCall,
    observations: &'a SimulatedObservations,
) -> Option<&'a ObservationEntry> {
    let global_default = || observations.tools.get(DEFAULT_KEY);

    if call.name == CALL_USER_TOOL {
        observations
            .call_user_tool
            .get(&call.tool_name)
            .or_else(|| observations.call_user_tool.get(DEFAULT_KEY))
            .or_else(global_default)
    } else {
        observations.tools.get(&call.name).or_else(global_default)
    }
}

/// Values available to observation templates, with braces doubled.
///
/// Later sources win: `turn`, `agent_tool`, `tool_name`, then fields, then
/// arguments.
pub fn observation_context(call: &ToolCall, turn: u32) -> BTreeMap<String, String> {
    let mut context = BTreeMap::new();
    context.insert("turn".to_string(), turn.to_string());
    context.insert("agent_tool".to_string(), call.name.clone());
    let tool_name = if call.tool_name.is_empty() {
        &call.name
    } else {
        &call.tool_name
    };
    context.insert("tool_name".to_string(), tool_name.clone());

    for (key, value) in call.fields.iter().chain(call.arguments.iter()) {
        context.insert(key.clone(), value.clone());
    }

    context
        .into_iter()
        .map(|(key, value)| (key, escape_braces(&value)))
        .collect()
}

/// Render the observation for `call` on `turn`.
pub fn build_observation(
    call: &ToolCall,
    observations: &SimulatedObservations,
    turn: u32,
) -> Result<String> {
    let Some(template) = find_entry(call, observations).and_then(ObservationEntry::template) else {
        return Ok(NO_OBSERVATION.to_string());
    };

    let context = observation_context(call, turn);
    render_format(template, &context).map_err(|e| match e {
        FormatError::UndefinedName { name, .. } => ForgeError::UserError(format!(
            "Observation template expected value for '{}'.",
            name
        )),
        other => ForgeError::UserError(format!("invalid observation template: {}", other)),
    })
}
