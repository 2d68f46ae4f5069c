//! Config loading, validation, and environment resolution.

use super::model::{Config, LlmConfig};
use crate::error::{ForgeError, Result};
use crate::llm::ProviderKind;
use std::path::Path;

/// Explicit provider selection.
pub const ENV_PROVIDER: &str = "_LLM_PROVIDER";
pub const ENV_ANTHROPIC_API_KEY: &str = "_ANTHROPIC_API_KEY";
pub const ENV_ANTHROPIC_BASE_URL: &str = "_ANTHROPIC_BASE_URL";
pub const ENV_OPENAI_API_KEY: &str = "_OPENAI_API_KEY";
pub const ENV_OPENAI_BASE_URL: &str = "_OPENAI_BASE_URL";
pub const ENV_MODEL_NAME: &str = "_MODEL_NAME";

impl Config {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            ForgeError::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty file means all defaults.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| ForgeError::Config(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| ForgeError::Config(format!("failed to serialize config to YAML: {}", e)))
    }

    /// Validate config values.
    ///
    /// Token budgets and the HTTP timeout must be positive, and an explicit
    /// provider must name a known provider.
    pub fn validate(&self) -> Result<()> {
        if self.generation.max_tokens == 0 {
            return Err(ForgeError::Config(
                "config validation failed: generation.max_tokens must be greater than 0"
                    .to_string(),
            ));
        }

        if self.testing.max_tokens == 0 {
            return Err(ForgeError::Config(
                "config validation failed: testing.max_tokens must be greater than 0".to_string(),
            ));
        }

        if self.llm.timeout_seconds == 0 {
            return Err(ForgeError::Config(
                "config validation failed: llm.timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if let Some(provider) = &self.llm.provider {
            provider.parse::<ProviderKind>()?;
        }

        Ok(())
    }

    /// Merge the `llm:` section with environment values.
    ///
    /// File values win. The provider comes from the file, then
    /// `_LLM_PROVIDER`, then OpenAI when only `_OPENAI_API_KEY` is set,
    /// otherwise Anthropic. Key and base URL are read from the chosen
    /// provider's variables. Empty environment values count as unset.
    pub fn resolve_llm<F>(&self, env: F) -> Result<LlmConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| env(key).filter(|value| !value.trim().is_empty());

        let provider = match self.llm.provider.clone().or_else(|| lookup(ENV_PROVIDER)) {
            Some(name) => name.parse::<ProviderKind>()?,
            None if lookup(ENV_OPENAI_API_KEY).is_some() => ProviderKind::OpenAi,
            None => ProviderKind::Anthropic,
        };

        let (key_var, url_var) = match provider {
            ProviderKind::Anthropic => (ENV_ANTHROPIC_API_KEY, ENV_ANTHROPIC_BASE_URL),
            ProviderKind::OpenAi => (ENV_OPENAI_API_KEY, ENV_OPENAI_BASE_URL),
        };

        Ok(LlmConfig {
            provider,
            model_name: self.llm.model_name.clone().or_else(|| lookup(ENV_MODEL_NAME)),
            api_key: self.llm.api_key.clone().or_else(|| lookup(key_var)),
            base_url: self.llm.base_url.clone().or_else(|| lookup(url_var)),
            timeout_seconds: self.llm.timeout_seconds,
        })
    }

    /// [`Config::resolve_llm`] against the process environment.
    pub fn resolve_llm_from_env(&self) -> Result<LlmConfig> {
        self.resolve_llm(|key| std::env::var(key).ok())
    }
}
