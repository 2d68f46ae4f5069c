//! Command implementations for promptforge.
//!
//! `dispatch` loads the config, resolves the provider settings once, and
//! routes the parsed command to its handler. `scan` stays offline and is
//! routed before either step.

mod cases;
mod generate;
mod run;
mod scan;
mod verify;

use crate::cli::{Cli, Command};
use crate::config::{Config, LlmConfig};
use crate::error::{ForgeError, Result};
use crate::llm::{ClientSource, LlmClient, ensure_client};
use crate::store::PromptStore;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "promptforge.yaml";

/// Everything a command needs, resolved once at startup.
pub struct CommandContext {
    pub config: Config,
    pub llm: LlmConfig,
    pub store: PromptStore,
}

impl CommandContext {
    pub fn new(config: Config, llm: LlmConfig, output_dir: Option<PathBuf>) -> Self {
        let root = output_dir.unwrap_or_else(|| config.testing.output_dir.clone());
        Self {
            config,
            llm,
            store: PromptStore::new(root),
        }
    }

    /// Build the provider client. Fails when credentials are missing.
    pub fn client(&self) -> Result<LlmClient> {
        let client = ensure_client(ClientSource::Config(self.llm.clone()))?;
        info!(
            provider = %self.llm.provider,
            endpoint = %client.endpoint(),
            "Using provider"
        );
        Ok(client)
    }
}

/// Dispatch a command to its implementation.
pub fn dispatch(cli: Cli) -> Result<()> {
    let command = match cli.command {
        Command::Scan(args) => return scan::cmd_scan(args),
        command => command,
    };

    let config = load_config(cli.config.as_deref())?;
    let llm = config.resolve_llm_from_env()?;
    let ctx = CommandContext::new(config, llm, cli.output_dir);

    match command {
        Command::Generate(args) => generate::cmd_generate(&ctx, args),
        Command::Run(args) => run::cmd_run(&ctx, args),
        Command::Test(args) => cases::cmd_test(&ctx, args),
        Command::Verify(args) => verify::cmd_verify(&ctx, args),
        Command::Scan(args) => scan::cmd_scan(args),
    }
}

/// Load `path`, or `promptforge.yaml` if present, or defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            debug!(path = DEFAULT_CONFIG_FILE, "Loading config from working directory");
            Config::load(DEFAULT_CONFIG_FILE)
        }
        None => Ok(Config::default()),
    }
}

/// Read a UTF-8 input file named on the command line.
pub(crate) fn read_input(path: &Path, what: &str) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        ForgeError::UserError(format!(
            "failed to read {} '{}': {}",
            what,
            path.display(),
            e
        ))
    })
}
