//! Multi-turn agent harness.
//!
//! Drives a template that expects a `$HISTORY`-style variable through a
//! scripted conversation. Each turn the model must answer with exactly one
//! `<tool_call>` element; the harness answers with a scripted observation
//! and appends both to the history for the next turn.
//!
//! # States
//!
//! ```text
//! AwaitingModelTurn --bad output--> FormatRetry --retries left--> AwaitingModelTurn
//!        |                               |
//!        |                               +--limit reached--> TerminalFailure
//!        +--finish tool--> TerminalSuccess (requirements checked)
//!        +--turn limit / deadline--> TerminalFailure
//! ```

mod config;
mod history;
mod observation;
mod requirements;
mod tool_call;
mod xml;

#[cfg(test)]
mod tests;

pub use config::{
    DEFAULT_TURN_MAX_TOKENS, MultiTurnConfig, ObservationEntry, Requirements,
    SimulatedObservations,
};
pub use history::{
    dedent, format_error_feedback, indent_block, render_format_violation, render_history,
    render_turn_entry,
};
pub use observation::{NO_OBSERVATION, build_observation, find_entry, observation_context};
pub use requirements::{PLAN_TOOL, check_requirements};
pub use tool_call::{
    CALL_USER_TOOL, TEXTUAL_FIELD_TAGS, ToolCall, ToolCallError, parse_tool_call, wrap_cdata,
    wrap_textual_fields,
};
pub use xml::{Element, Node, XmlError, parse_element};

use crate::error::{ForgeError, Result};
use crate::llm::LanguageModel;
use crate::runner::{PromptTestResult, ensure_filled, fill_template, run_filled};
use crate::text::{DEFAULT_LINE_LENGTH, pretty_print};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// One model attempt, successful or rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// 1-based turn number.
    pub turn: u32,
    /// 1-based attempt within the turn.
    pub attempt: u32,
    pub history_before: String,
    pub prompt_with_variables: String,
    pub thinking: String,
    pub output: String,
    pub tool_call: Option<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_error: Option<String>,
    /// Scripted observation, or the format-error feedback.
    pub observation: String,
}

/// A conversation that reached the finish tool and met its requirements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarnessOutcome {
    pub conversation: Vec<ConversationTurn>,
    pub final_history: String,
    /// User tools in call order, repeats included.
    pub used_user_tools: Vec<String>,
    pub finish_call: ToolCall,
}

/// Harness states.
#[derive(Debug)]
pub enum HarnessState {
    AwaitingModelTurn {
        turn: u32,
        attempt: u32,
    },
    FormatRetry {
        turn: u32,
        attempt: u32,
        error: ToolCallError,
        history_before: String,
        result: PromptTestResult,
    },
    TerminalSuccess {
        finish_call: ToolCall,
    },
    TerminalFailure(ForgeError),
}

/// Run a multi-turn conversation for one test case.
///
/// `variables` are the case's template values; the history variable is
/// added on every turn. `case_max_tokens` is the case-level budget used
/// when the config sets no per-turn budget.
pub fn run_conversation(
    model: &dyn LanguageModel,
    template: &str,
    variables: &BTreeMap<String, String>,
    config: &MultiTurnConfig,
    case_max_tokens: Option<u32>,
) -> Result<HarnessOutcome> {
    let mut conversation = Conversation {
        model,
        template,
        variables,
        config,
        max_tokens: config.turn_max_tokens(case_max_tokens),
        started: Instant::now(),
        history: Vec::new(),
        log: Vec::new(),
        used_user_tools: Vec::new(),
    };

    let mut state = HarnessState::AwaitingModelTurn {
        turn: 1,
        attempt: 1,
    };

    loop {
        state = match state {
            HarnessState::AwaitingModelTurn { turn, attempt } => {
                conversation.model_turn(turn, attempt)?
            }
            HarnessState::FormatRetry {
                turn,
                attempt,
                error,
                history_before,
                result,
            } => conversation.format_retry(turn, attempt, error, history_before, result),
            HarnessState::TerminalSuccess { finish_call } => {
                return conversation.finish(finish_call);
            }
            HarnessState::TerminalFailure(err) => return Err(err),
        };
    }
}

struct Conversation<'a> {
    model: &'a dyn LanguageModel,
    template: &'a str,
    variables: &'a BTreeMap<String, String>,
    config: &'a MultiTurnConfig,
    max_tokens: u32,
    started: Instant,
    history: Vec<String>,
    log: Vec<ConversationTurn>,
    used_user_tools: Vec<String>,
}

impl Conversation<'_> {
    fn render_history(&self) -> String {
        render_history(&self.config.initial_turns, &self.history)
    }

    fn model_turn(&mut self, turn: u32, attempt: u32) -> Result<HarnessState> {
        if turn > self.config.max_turns {
            return Ok(HarnessState::TerminalFailure(ForgeError::TurnLimit {
                finish_tool: self.config.finish_tool.clone(),
                max_turns: self.config.max_turns,
            }));
        }

        if let Some(seconds) = self.config.deadline_seconds
            && self.started.elapsed() >= Duration::from_secs(seconds)
        {
            return Ok(HarnessState::TerminalFailure(ForgeError::Deadline {
                seconds,
                turn,
            }));
        }

        let history_before = self.render_history();
        let prompt = fill_turn_prompt(
            self.template,
            self.variables,
            &self.config.history_variable,
            &history_before,
        )?;
        let mut values = self.variables.clone();
        values.insert(self.config.history_variable.clone(), history_before.clone());

        let result = run_filled(self.model, prompt, &values, self.max_tokens)?;
        let output = result.output.trim();
        debug!(
            turn,
            attempt,
            "Model output:\n{}",
            if output.is_empty() {
                "(empty)".to_string()
            } else {
                pretty_print(output, DEFAULT_LINE_LENGTH)
            }
        );

        let call = match parse_tool_call(output) {
            Ok(call) => call,
            Err(error) => {
                return Ok(HarnessState::FormatRetry {
                    turn,
                    attempt,
                    error,
                    history_before,
                    result,
                });
            }
        };

        info!(turn, tool = %call.name, "Agent turn");
        if call.name == CALL_USER_TOOL {
            info!(turn, user_tool = %call.tool_name, arguments = ?call.arguments, "User tool invoked");
            self.used_user_tools.push(call.tool_name.clone());
        }

        let observation = build_observation(&call, &self.config.simulated_observations, turn)?;
        debug!(turn, "Observation:\n{}", pretty_print(&observation, DEFAULT_LINE_LENGTH));

        self.history
            .push(render_turn_entry(turn, &call.xml, &observation));
        self.log.push(ConversationTurn {
            turn,
            attempt,
            history_before,
            prompt_with_variables: result.prompt_with_variables,
            thinking: result.thinking,
            output: result.output,
            tool_call: Some(call.clone()),
            format_error: None,
            observation,
        });

        if call.name == self.config.finish_tool {
            Ok(HarnessState::TerminalSuccess { finish_call: call })
        } else {
            Ok(HarnessState::AwaitingModelTurn {
                turn: turn + 1,
                attempt: 1,
            })
        }
    }

    fn format_retry(
        &mut self,
        turn: u32,
        attempt: u32,
        error: ToolCallError,
        history_before: String,
        result: PromptTestResult,
    ) -> HarnessState {
        let message = error.to_string();

        if attempt >= self.config.format_retry_limit {
            return HarnessState::TerminalFailure(ForgeError::Protocol { turn, message });
        }

        warn!(turn, attempt, error = %message, "Format violation, retrying turn");

        let feedback = format_error_feedback(&message);
        self.history.push(render_format_violation(
            turn,
            result.output.trim(),
            &feedback,
            attempt,
        ));
        self.log.push(ConversationTurn {
            turn,
            attempt,
            history_before,
            prompt_with_variables: result.prompt_with_variables,
            thinking: result.thinking,
            output: result.output,
            tool_call: None,
            format_error: Some(message),
            observation: feedback,
        });

        HarnessState::AwaitingModelTurn {
            turn,
            attempt: attempt + 1,
        }
    }

    fn finish(self, finish_call: ToolCall) -> Result<HarnessOutcome> {
        check_requirements(
            &self.config.requirements,
            &self.log,
            &self.used_user_tools,
            Some(&finish_call),
        )?;

        info!(
            turns = finish_call_turn(&self.log),
            user_tools = self.used_user_tools.len(),
            "Conversation finished"
        );

        let final_history = self.render_history();
        Ok(HarnessOutcome {
            conversation: self.log,
            final_history,
            used_user_tools: self.used_user_tools,
            finish_call,
        })
    }
}

/// Fill a turn's prompt: case values first, then the history.
///
/// The history goes in last so text the model wrote earlier is never
/// rewritten by case values. A case value under the history name is ignored.
pub fn fill_turn_prompt(
    template: &str,
    variables: &BTreeMap<String, String>,
    history_variable: &str,
    history: &str,
) -> Result<String> {
    let bare_history = history_variable.trim_start_matches('$');
    let case_values: BTreeMap<String, String> = variables
        .iter()
        .filter(|(name, _)| name.trim_start_matches('$') != bare_history)
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();

    let prompt = fill_template(template, &case_values);
    let prompt = fill_template(
        &prompt,
        &BTreeMap::from([(history_variable.to_string(), history.to_string())]),
    );
    ensure_filled(&prompt)?;
    Ok(prompt)
}

fn finish_call_turn(log: &[ConversationTurn]) -> u32 {
    log.last().map(|turn| turn.turn).unwrap_or(0)
}
