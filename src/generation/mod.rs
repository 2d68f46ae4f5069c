//! Prompt-template generation.
//!
//! Two passes against the model:
//!
//! 1. The metaprompt drafts a template; the first `<Instructions>` block of
//!    the reply is extracted and lightly cleaned.
//! 2. If the draft uses `{$VAR}` outside any tag, a cleanup prompt asks the
//!    model to fix those usages. A "no changes" style reply keeps the draft.
//!
//! Failures from the provider propagate unchanged; nothing is retried.

mod cleanup;
mod metaprompt;
mod overrides;


pub use cleanup::{CleanupOutcome, NO_CHANGE_PHRASES, is_no_change, remove_floating_variables};
pub use metaprompt::{
    METAPROMPT, PROMPT_PLACEHOLDER, REMOVE_FLOATING_VARIABLES_PROMPT, TASK_PLACEHOLDER,
    assistant_prefill,
};
pub use overrides::{
    AGENT_X_SLUG, AGENT_X_TEMPLATE, OVERRIDE_ANALYSIS, OVERRIDE_NOTE, PromptOverride,
    apply_override, find_override,
};

use crate::config::GenerationSection;
use crate::error::{ForgeError, Result};
use crate::llm::{BlockKind, GenerationParams, LanguageModel, Message};
use crate::scan::find_floating_variables;
use crate::text::{extract_placeholder_names, extract_template_body};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info, warn};

/// A generated prompt template and everything that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedPrompt {
    pub task: String,
    /// Requested variable names, upper-cased.
    pub requested_variables: Vec<String>,
    /// Placeholder names present in `final_prompt_template`.
    pub identified_variables: BTreeSet<String>,
    /// Floating usages found in the draft, in order.
    #[serde(default)]
    pub floating_variables: Vec<String>,
    pub metaprompt_thinking: String,
    pub metaprompt_response: String,
    #[serde(default)]
    pub floating_variable_analysis: Option<String>,
    /// Template as extracted from the first pass.
    pub raw_prompt_template: String,
    /// Template after cleanup (or override).
    pub final_prompt_template: String,
    /// Set once an override has replaced the templates.
    #[serde(default)]
    pub override_applied: bool,
}

impl GeneratedPrompt {
    /// The template to use.
    pub fn prompt(&self) -> &str {
        &self.final_prompt_template
    }
}

/// Knobs for both generation passes.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub max_tokens: u32,
    pub temperature: f32,
    /// First-pass prompt; must contain `{{TASK}}`.
    pub metaprompt: String,
    /// Cleanup prompt; must contain `{$PROMPT}`.
    pub cleanup_prompt: String,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            temperature: 0.0,
            metaprompt: METAPROMPT.to_string(),
            cleanup_prompt: REMOVE_FLOATING_VARIABLES_PROMPT.to_string(),
        }
    }
}

impl GenerationSettings {
    /// Build settings from the `generation:` config section, reading any
    /// replacement prompt files.
    pub fn from_config(section: &GenerationSection) -> Result<Self> {
        let mut settings = Self {
            max_tokens: section.max_tokens,
            ..Self::default()
        };

        if let Some(path) = &section.metaprompt_file {
            settings.metaprompt = read_prompt_file(path, TASK_PLACEHOLDER)?;
        }
        if let Some(path) = &section.cleanup_prompt_file {
            settings.cleanup_prompt = read_prompt_file(path, PROMPT_PLACEHOLDER)?;
        }

        Ok(settings)
    }
}

fn read_prompt_file(path: &Path, placeholder: &str) -> Result<String> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        ForgeError::Config(format!(
            "failed to read prompt file '{}': {}",
            path.display(),
            e
        ))
    })?;

    if !text.contains(placeholder) {
        return Err(ForgeError::Config(format!(
            "prompt file '{}' does not contain the {} placeholder",
            path.display(),
            placeholder
        )));
    }

    Ok(text)
}

/// Runs the two-pass generation protocol against one model.
pub struct TemplateGenerator<'a> {
    model: &'a dyn LanguageModel,
    settings: GenerationSettings,
}

impl<'a> TemplateGenerator<'a> {
    pub fn new(model: &'a dyn LanguageModel) -> Self {
        Self {
            model,
            settings: GenerationSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Generate a template for `task` using `requested_variables`.
    ///
    /// Makes one model call, plus a cleanup call when the draft has
    /// floating variables.
    pub fn generate(&self, task: &str, requested_variables: &[String]) -> Result<GeneratedPrompt> {
        if task.trim().is_empty() {
            return Err(ForgeError::UserError(
                "task description must not be empty".to_string(),
            ));
        }

        let requested: Vec<String> = requested_variables
            .iter()
            .map(|name| name.to_uppercase())
            .collect();

        let prompt = self.settings.metaprompt.replace(TASK_PLACEHOLDER, task);
        let prefill = assistant_prefill(&requested);
        let params = GenerationParams::new(self.settings.max_tokens)
            .with_temperature(self.settings.temperature);

        info!(
            model = self.model.model_name(),
            variables = requested.len(),
            "Drafting prompt template"
        );

        let response = self
            .model
            .create_message(&[Message::user(prompt), Message::assistant(prefill)], &params)?;

        let metaprompt_thinking = response.joined(BlockKind::Thinking);
        let metaprompt_response = response.joined(BlockKind::Text);

        let raw_prompt_template = extract_template_body(&metaprompt_response)?;
        let floating_variables = find_floating_variables(&raw_prompt_template);
        debug!(floating = ?floating_variables, "Scanned draft for floating variables");

        let mut final_prompt_template = raw_prompt_template.clone();
        let mut floating_variable_analysis = None;

        if !floating_variables.is_empty() {
            info!(
                count = floating_variables.len(),
                "Running floating-variable cleanup pass"
            );
            let outcome =
                remove_floating_variables(self.model, &raw_prompt_template, &self.settings)?;
            floating_variable_analysis = Some(outcome.analysis);

            match outcome.rewritten {
                Some(rewritten) => final_prompt_template = rewritten,
                None => warn!("Cleanup pass made no changes; keeping draft"),
            }
        }

        let identified_variables = extract_placeholder_names(&final_prompt_template);

        Ok(GeneratedPrompt {
            task: task.to_string(),
            requested_variables: requested,
            identified_variables,
            floating_variables,
            metaprompt_thinking,
            metaprompt_response,
            floating_variable_analysis,
            raw_prompt_template,
            final_prompt_template,
            override_applied: false,
        })
    }
}
