//! Second pass: ask the model to fix floating variable usages.

use super::GenerationSettings;
use super::metaprompt::PROMPT_PLACEHOLDER;
use crate::error::{ForgeError, Result};
use crate::llm::{BlockKind, GenerationParams, LanguageModel, Message};
use crate::text::extract_between_tags;

/// Normalized rewrites that mean "keep the draft".
///
/// Matching is exact after trim and lowercase, so variants such as
/// "No changes needed." are treated as a rewrite.
pub const NO_CHANGE_PHRASES: [&str; 5] = [
    "no changes.",
    "no changes",
    "no change",
    "no edits needed",
    "no edit needed",
];

/// Result of the cleanup call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupOutcome {
    /// Replacement template, or `None` when the draft stands.
    pub rewritten: Option<String>,
    /// Full text of the model's response.
    pub analysis: String,
}

/// Run the cleanup prompt against `template`.
pub fn remove_floating_variables(
    model: &dyn LanguageModel,
    template: &str,
    settings: &GenerationSettings,
) -> Result<CleanupOutcome> {
    let prompt = settings.cleanup_prompt.replace(PROMPT_PLACEHOLDER, template);
    let params = GenerationParams::new(settings.max_tokens).with_temperature(settings.temperature);

    let response = model.create_message(&[Message::user(prompt)], &params)?;
    let analysis = response.joined(BlockKind::Text);

    let rewritten = extract_between_tags("rewritten_prompt", &analysis)
        .into_iter()
        .next()
        .ok_or_else(|| {
            ForgeError::Extraction(
                "cleanup response does not contain a <rewritten_prompt> block".to_string(),
            )
        })?;

    let rewritten = if is_no_change(&rewritten, template) {
        None
    } else {
        Some(rewritten)
    };

    Ok(CleanupOutcome {
        rewritten,
        analysis,
    })
}

/// Whether `rewritten` amounts to no edit of `template`.
pub fn is_no_change(rewritten: &str, template: &str) -> bool {
    let normalized = rewritten.trim().to_lowercase();
    NO_CHANGE_PHRASES.contains(&normalized.as_str())
        || normalized == template.trim().to_lowercase()
}
