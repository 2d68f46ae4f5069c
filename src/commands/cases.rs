//! `promptforge test`: run test-case files against saved prompts.

use super::run::render_result;
use super::{CommandContext, read_input};
use crate::cli::TestArgs;
use crate::error::{ForgeError, Result};
use crate::harness::{MultiTurnConfig, run_conversation};
use crate::llm::LanguageModel;
use crate::runner::run_template;
use crate::store::PromptStore;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// One test case for a saved prompt.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TestCase {
    #[serde(default = "default_case_name")]
    pub name: String,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    /// Single-shot budget, and the per-turn fallback for multi-turn cases.
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub multi_turn: Option<MultiTurnConfig>,
}

fn default_case_name() -> String {
    "default".to_string()
}

/// Test cases keyed by prompt slug.
pub type CaseFile = BTreeMap<String, Vec<TestCase>>;

pub fn load_cases(path: &Path) -> Result<CaseFile> {
    let content = read_input(path, "test-case file")?;
    serde_json::from_str(&content).map_err(|e| {
        ForgeError::UserError(format!(
            "failed to parse test-case file '{}': {}",
            path.display(),
            e
        ))
    })
}

pub fn cmd_test(ctx: &CommandContext, args: TestArgs) -> Result<()> {
    let cases = load_cases(&args.cases)?;
    let client = ctx.client()?;

    let saved = run_cases(&client, &cases, &ctx.store, ctx.config.testing.max_tokens)?;

    println!(
        "\nAll prompt tests executed ({} results). Outputs saved to {}",
        saved.len(),
        ctx.store.root().join("tests").display()
    );
    Ok(())
}

/// Run every case and save one result file per case.
///
/// The first failing case aborts the run; results saved before it are kept.
pub fn run_cases(
    model: &dyn LanguageModel,
    cases: &CaseFile,
    store: &PromptStore,
    default_max_tokens: u32,
) -> Result<Vec<PathBuf>> {
    let mut saved = Vec::new();

    for (slug, slug_cases) in cases {
        let stored = store.load_prompt(slug)?;
        let template = stored.prompt.prompt();
        println!("{}", "=".repeat(80));
        println!("Running tests for {} ({})", slug, stored.prompt.task);

        for case in slug_cases {
            println!("\n- Test case: {}", case.name);

            let payload = match &case.multi_turn {
                Some(multi_turn) => {
                    let outcome = run_conversation(
                        model,
                        template,
                        &case.variables,
                        multi_turn,
                        case.max_tokens,
                    )?;
                    println!(
                        "  Finished after {} attempts; user tools: {}",
                        outcome.conversation.len(),
                        if outcome.used_user_tools.is_empty() {
                            "(none)".to_string()
                        } else {
                            outcome.used_user_tools.join(", ")
                        }
                    );
                    json!({
                        "slug": slug,
                        "task": stored.prompt.task,
                        "test_case_name": case.name,
                        "variables": case.variables,
                        "conversation": outcome.conversation,
                        "final_history": outcome.final_history,
                        "used_user_tools": outcome.used_user_tools,
                        "finish_call": outcome.finish_call,
                        "requirements": multi_turn.requirements,
                        "passes_requirements": true,
                    })
                }
                None => {
                    let max_tokens = case.max_tokens.unwrap_or(default_max_tokens);
                    let result = run_template(model, template, &case.variables, max_tokens)?;
                    print!("{}", render_result(&result));
                    json!({
                        "slug": slug,
                        "task": stored.prompt.task,
                        "test_case_name": case.name,
                        "variables": case.variables,
                        "prompt_with_variables": result.prompt_with_variables,
                        "thinking": result.thinking,
                        "output": result.output,
                    })
                }
            };

            let path = store.save_test_result(slug, &case.name, &payload)?;
            info!(slug = %slug, case = %case.name, path = %path.display(), "Saved test result");
            saved.push(path);
        }
    }

    Ok(saved)
}
