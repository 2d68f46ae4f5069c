//! `promptforge run`.

use super::{CommandContext, read_input};
use crate::cli::RunArgs;
use crate::error::{ForgeError, Result};
use crate::runner::{PromptTestResult, run_template};
use crate::text::{DEFAULT_LINE_LENGTH, pretty_print};
use std::collections::BTreeMap;

pub fn cmd_run(ctx: &CommandContext, args: RunArgs) -> Result<()> {
    let template = match (&args.slug, &args.template_file) {
        (Some(slug), _) => ctx.store.load_prompt(slug)?.prompt.final_prompt_template,
        (None, Some(path)) => read_input(path, "template file")?,
        (None, None) => {
            return Err(ForgeError::UserError(
                "either --slug or --template-file is required".to_string(),
            ));
        }
    };

    let values: BTreeMap<String, String> = args.vars.into_iter().collect();
    let max_tokens = args.max_tokens.unwrap_or(ctx.config.testing.max_tokens);

    let client = ctx.client()?;
    let result = run_template(&client, &template, &values, max_tokens)?;

    print!("{}", render_result(&result));
    Ok(())
}

/// Human-readable report of a single run.
pub(crate) fn render_result(result: &PromptTestResult) -> String {
    let mut out = String::new();

    out.push_str("Prompt sent to model:\n\n");
    out.push_str(&pretty_print(&result.prompt_with_variables, DEFAULT_LINE_LENGTH));
    out.push('\n');

    if !result.thinking.is_empty() {
        out.push_str("\nModel thinking:\n\n");
        out.push_str(&pretty_print(&result.thinking, DEFAULT_LINE_LENGTH));
        out.push('\n');
    }

    out.push_str("\nModel output:\n\n");
    out.push_str(&pretty_print(&result.output, DEFAULT_LINE_LENGTH));
    out.push('\n');
    out
}
