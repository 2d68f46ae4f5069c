//! Template filling and single-shot test runs.

use crate::error::{ForgeError, Result};
use crate::llm::{BlockKind, GenerationParams, LanguageModel, Message};
use crate::text::extract_placeholder_names;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// Outcome of running a filled template once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTestResult {
    pub prompt_with_variables: String,
    pub variables: BTreeMap<String, String>,
    pub thinking: String,
    pub output: String,
    /// `thinking` and `output` separated by a blank line when both exist.
    pub raw_response: String,
}

/// Replace `{name}` and its `$`-toggled spelling for every entry in `values`.
///
/// `"$NAME"` fills both `{$NAME}` and `{NAME}`; `"NAME"` fills both as well.
pub fn fill_template(template: &str, values: &BTreeMap<String, String>) -> String {
    let mut prompt = template.to_string();

    for (name, value) in values {
        let toggled = match name.strip_prefix('$') {
            Some(bare) => bare.to_string(),
            None => format!("${}", name),
        };
        for variant in [name.as_str(), toggled.as_str()] {
            prompt = prompt.replace(&format!("{{{}}}", variant), value);
        }
    }

    prompt
}

/// [`fill_template`], failing if any `{...}` placeholder is left over.
pub fn fill_template_checked(template: &str, values: &BTreeMap<String, String>) -> Result<String> {
    let filled = fill_template(template, values);
    ensure_filled(&filled)?;
    Ok(filled)
}

/// Fail with every `{...}` placeholder still present in `prompt`.
pub fn ensure_filled(prompt: &str) -> Result<()> {
    let missing = extract_placeholder_names(prompt);

    if !missing.is_empty() {
        return Err(ForgeError::Substitution {
            missing: missing.into_iter().collect(),
        });
    }

    Ok(())
}

/// Fill `template` and send it as a single user message.
///
/// Unresolved placeholders are reported before any model call. No
/// temperature is set, so the provider default applies.
pub fn run_template(
    model: &dyn LanguageModel,
    template: &str,
    values: &BTreeMap<String, String>,
    max_tokens: u32,
) -> Result<PromptTestResult> {
    let prompt_with_variables = fill_template_checked(template, values)?;
    run_filled(model, prompt_with_variables, values, max_tokens)
}

/// Send an already-filled prompt as a single user message.
///
/// `values` is recorded on the result as-is.
pub fn run_filled(
    model: &dyn LanguageModel,
    prompt_with_variables: String,
    values: &BTreeMap<String, String>,
    max_tokens: u32,
) -> Result<PromptTestResult> {
    info!(
        model = model.model_name(),
        chars = prompt_with_variables.len(),
        max_tokens,
        "Running filled template"
    );

    let response = model.create_message(
        &[Message::user(prompt_with_variables.clone())],
        &GenerationParams::new(max_tokens),
    )?;

    let thinking = response.joined(BlockKind::Thinking);
    let output = response.joined(BlockKind::Text);
    let raw_response = match (thinking.is_empty(), output.is_empty()) {
        (false, false) => format!("{}\n\n{}", thinking, output),
        (false, true) => thinking.clone(),
        _ => output.clone(),
    };

    Ok(PromptTestResult {
        prompt_with_variables,
        variables: values.clone(),
        thinking,
        output,
        raw_response,
    })
}
