//! Config struct definitions and defaults.

use crate::llm::ProviderKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration file.
///
/// ```yaml
/// llm:
///   provider: anthropic
///   model_name: claude-sonnet-4-5
/// generation:
///   max_tokens: 4096
/// testing:
///   output_dir: generated_prompts
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Provider credentials and transport settings.
    pub llm: LlmSettings,

    /// Template generation settings.
    pub generation: GenerationSection,

    /// Template test run settings.
    pub testing: TestingSection,
}

/// `llm:` section. Unset values fall back to the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// `anthropic` or `openai` (case-insensitive).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Overrides the provider's default endpoint root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Per-request HTTP timeout.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: None,
            model_name: None,
            api_key: None,
            base_url: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

/// `generation:` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSection {
    /// Output budget for the metaprompt and cleanup calls.
    #[serde(default = "default_generation_max_tokens")]
    pub max_tokens: u32,

    /// Replacement metaprompt text (must contain `{{TASK}}`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metaprompt_file: Option<PathBuf>,

    /// Replacement cleanup prompt text (must contain `{$PROMPT}`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleanup_prompt_file: Option<PathBuf>,
}

impl Default for GenerationSection {
    fn default() -> Self {
        Self {
            max_tokens: default_generation_max_tokens(),
            metaprompt_file: None,
            cleanup_prompt_file: None,
        }
    }
}

/// `testing:` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestingSection {
    /// Default output budget for single-shot test runs.
    #[serde(default = "default_testing_max_tokens")]
    pub max_tokens: u32,

    /// Directory holding saved prompts, the index and test results.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for TestingSection {
    fn default() -> Self {
        Self {
            max_tokens: default_testing_max_tokens(),
            output_dir: default_output_dir(),
        }
    }
}

/// Fully resolved provider configuration handed to the client factory.
///
/// Credentials stay optional here; [`crate::llm::ensure_client`] reports
/// which one is missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmConfig {
    pub provider: ProviderKind,
    pub model_name: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
    120
}

fn default_generation_max_tokens() -> u32 {
    4096
}

fn default_testing_max_tokens() -> u32 {
    1024
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("generated_prompts")
}
