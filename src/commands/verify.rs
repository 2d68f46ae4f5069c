//! `promptforge verify`: provider health check.

use super::CommandContext;
use crate::cli::VerifyArgs;
use crate::error::Result;
use crate::llm::{BlockKind, GenerationParams, LanguageModel, Message};
use crate::text::{DEFAULT_LINE_LENGTH, pretty_print};
use tracing::info;

pub fn cmd_verify(ctx: &CommandContext, args: VerifyArgs) -> Result<()> {
    let client = ctx.client()?;
    print!("{}", verify_provider(&client, &args)?);
    Ok(())
}

/// Send the check prompt and render the reply.
pub fn verify_provider(model: &dyn LanguageModel, args: &VerifyArgs) -> Result<String> {
    info!(model = model.model_name(), "Verifying provider");

    let response = model.create_message(
        &[
            Message::system(args.system.clone()),
            Message::user(args.prompt.clone()),
        ],
        &GenerationParams::new(args.max_tokens),
    )?;

    let thinking = response.joined(BlockKind::Thinking);
    let output = response.joined(BlockKind::Text);

    let mut out = String::new();
    if !thinking.is_empty() {
        out.push_str("Thinking:\n\n");
        out.push_str(&pretty_print(&thinking, DEFAULT_LINE_LENGTH));
        out.push_str(&format!("\n\n{}\n\n", "-".repeat(80)));
    }

    if output.is_empty() {
        out.push_str("No text response returned from the model.\n");
    } else {
        out.push_str("Response:\n\n");
        out.push_str(&pretty_print(&output, DEFAULT_LINE_LENGTH));
        out.push('\n');
    }
    Ok(out)
}
