//! `promptforge generate`.

use super::{CommandContext, read_input};
use crate::cli::GenerateArgs;
use crate::error::{ForgeError, Result};
use crate::generation::{GeneratedPrompt, GenerationSettings, TemplateGenerator, apply_override};
use crate::llm::LanguageModel;
use crate::store::{IndexEntry, PromptStore};
use crate::text::{DEFAULT_LINE_LENGTH, pretty_print, slugify};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// One entry of a `--tasks` file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaskDefinition {
    #[serde(default)]
    pub task: String,
    #[serde(default)]
    pub variables: Vec<String>,
}

/// Read a JSON list of task definitions. Every entry needs a `task`.
pub fn load_tasks(path: &Path) -> Result<Vec<TaskDefinition>> {
    let content = read_input(path, "tasks file")?;
    parse_tasks(&content)
        .map_err(|e| ForgeError::UserError(format!("{} (in '{}')", e, path.display())))
}

fn parse_tasks(content: &str) -> Result<Vec<TaskDefinition>> {
    let entries: Vec<serde_json::Value> = serde_json::from_str(content)
        .map_err(|e| ForgeError::UserError(format!("failed to parse tasks file: {}", e)))?;

    entries
        .into_iter()
        .map(|entry| {
            let definition: TaskDefinition = serde_json::from_value(entry.clone())
                .map_err(|e| ForgeError::UserError(format!("invalid task entry {}: {}", entry, e)))?;
            if definition.task.trim().is_empty() {
                return Err(ForgeError::UserError(format!(
                    "Task entry is missing a 'task' field: {}",
                    entry
                )));
            }
            Ok(definition)
        })
        .collect()
}

pub fn cmd_generate(ctx: &CommandContext, args: GenerateArgs) -> Result<()> {
    let tasks = match (&args.tasks, args.task) {
        (Some(path), _) => load_tasks(path)?,
        (None, Some(task)) => vec![TaskDefinition {
            task,
            variables: args.vars,
        }],
        (None, None) => {
            return Err(ForgeError::UserError(
                "either --task or --tasks is required".to_string(),
            ));
        }
    };

    let mut section = ctx.config.generation.clone();
    if args.metaprompt_file.is_some() {
        section.metaprompt_file = args.metaprompt_file;
    }
    if args.cleanup_prompt_file.is_some() {
        section.cleanup_prompt_file = args.cleanup_prompt_file;
    }
    let settings = GenerationSettings::from_config(&section)?;

    let client = ctx.client()?;
    let store = (!args.no_save).then_some(&ctx.store);

    generate_all(&client, settings, &tasks, store)?;

    if let Some(store) = store {
        println!(
            "\nPrompt generation complete. Output saved to {}",
            store.root().display()
        );
    }
    Ok(())
}

/// Generate every task in order, printing each final template.
///
/// With a store, each prompt is saved as it completes and the index is
/// rewritten once all tasks succeed.
pub fn generate_all(
    model: &dyn LanguageModel,
    settings: GenerationSettings,
    tasks: &[TaskDefinition],
    store: Option<&PromptStore>,
) -> Result<Vec<(String, GeneratedPrompt)>> {
    let generator = TemplateGenerator::new(model).with_settings(settings);
    let mut generated = Vec::with_capacity(tasks.len());

    for task in tasks {
        println!("{}", "=".repeat(80));
        println!("Generating prompt for task: {}", task.task);

        let slug = slugify(&task.task);
        let prompt = apply_override(&slug, generator.generate(&task.task, &task.variables)?);

        if let Some(store) = store {
            store.save_prompt(&slug, &prompt)?;
        }
        info!(slug = %slug, override_applied = prompt.override_applied, "Generated prompt");

        println!("\nFinal prompt template:\n");
        println!("{}", pretty_print(prompt.prompt(), DEFAULT_LINE_LENGTH));
        let variables: Vec<&str> = prompt
            .identified_variables
            .iter()
            .map(String::as_str)
            .collect();
        println!(
            "\nVariables identified: {}",
            if variables.is_empty() {
                "(none)".to_string()
            } else {
                variables.join(", ")
            }
        );

        generated.push((slug, prompt));
    }

    if let Some(store) = store {
        let index: Vec<IndexEntry> = generated
            .iter()
            .map(|(slug, prompt)| IndexEntry::new(slug, prompt))
            .collect();
        store.write_index(&index)?;
    }

    Ok(generated)
}
