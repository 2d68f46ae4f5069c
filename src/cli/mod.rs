//! CLI argument parsing for promptforge.
//!
//! Uses clap derive macros for declarative argument definitions.
//! Implementations live in the `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// promptforge: generate variable-parameterized prompt templates and test them.
///
/// Templates are drafted by a metaprompt, cleaned of floating `{$VAR}`
/// usages, saved as JSON under the output directory, and exercised with
/// single-shot or multi-turn test cases.
#[derive(Parser, Debug)]
#[command(name = "promptforge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// YAML config file. Defaults apply when omitted.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log at debug level (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory for generated prompts and test results.
    ///
    /// Overrides `testing.output_dir` from the config file.
    #[arg(long, global = true, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate prompt templates from task descriptions.
    ///
    /// Runs the metaprompt, cleans floating variables, applies any built-in
    /// override for the task's slug, and saves the result.
    Generate(GenerateArgs),

    /// Fill a template and run it once against the model.
    Run(RunArgs),

    /// Execute a test-case file against saved prompts.
    ///
    /// Cases with a `multi_turn` block run through the agent harness.
    Test(TestArgs),

    /// Report placeholders and floating variables in a template (offline).
    Scan(ScanArgs),

    /// Send a one-line prompt to check provider credentials and connectivity.
    Verify(VerifyArgs),
}

/// Arguments for the `generate` command.
#[derive(Parser, Debug)]
pub struct GenerateArgs {
    /// Task description to generate a template for.
    #[arg(long, required_unless_present = "tasks", conflicts_with = "tasks")]
    pub task: Option<String>,

    /// Variable the template should take (repeatable).
    #[arg(long = "var", value_name = "NAME")]
    pub vars: Vec<String>,

    /// JSON list of `{"task": ..., "variables": [...]}` entries.
    #[arg(long, value_name = "FILE")]
    pub tasks: Option<PathBuf>,

    /// Print the templates without writing prompt files or the index.
    #[arg(long)]
    pub no_save: bool,

    /// Replacement metaprompt; must contain `{{TASK}}`.
    #[arg(long, value_name = "FILE")]
    pub metaprompt_file: Option<PathBuf>,

    /// Replacement cleanup prompt; must contain `{$PROMPT}`.
    #[arg(long, value_name = "FILE")]
    pub cleanup_prompt_file: Option<PathBuf>,
}

/// Arguments for the `run` command.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Slug of a saved prompt.
    #[arg(long, required_unless_present = "template_file", conflicts_with = "template_file")]
    pub slug: Option<String>,

    /// Template file to run instead of a saved prompt.
    #[arg(long, value_name = "FILE")]
    pub template_file: Option<PathBuf>,

    /// Variable value (repeatable).
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_var)]
    pub vars: Vec<(String, String)>,

    /// Output token budget; defaults to `testing.max_tokens`.
    #[arg(long)]
    pub max_tokens: Option<u32>,
}

/// Arguments for the `test` command.
#[derive(Parser, Debug)]
pub struct TestArgs {
    /// JSON object mapping slugs to lists of test cases.
    #[arg(long, value_name = "FILE")]
    pub cases: PathBuf,
}

/// Arguments for the `scan` command.
#[derive(Parser, Debug)]
pub struct ScanArgs {
    /// Template file to scan.
    #[arg(long, value_name = "FILE")]
    pub template_file: PathBuf,
}

/// Arguments for the `verify` command.
#[derive(Parser, Debug)]
pub struct VerifyArgs {
    /// User message to send.
    #[arg(long, default_value = "Hi")]
    pub prompt: String,

    /// System message sent with the prompt.
    #[arg(long, default_value = "You are a helpful assistant.")]
    pub system: String,

    /// Output token budget.
    #[arg(long, default_value_t = 256)]
    pub max_tokens: u32,
}

/// Parse `NAME=VALUE`, splitting at the first `=`.
fn parse_var(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got '{}'", raw)),
    }
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
