//! Provider client abstraction.
//!
//! Two providers with different calling conventions sit behind one
//! interface:
//!
//! - **Anthropic**: messages API, typed content blocks (`text`, `thinking`)
//! - **OpenAI-compatible**: chat completions, `choices[].message` with
//!   reasoning in `reasoning_details` or `reasoning`
//!
//! The set of providers is closed: adding one means a new [`ProviderKind`]
//! variant, a payload branch in [`client`] and a response branch in
//! [`response`]. Everything above this module talks to the
//! [`LanguageModel`] trait, which is also the seam tests fake.

mod client;
mod response;


pub use client::{ClientSource, LlmClient, ensure_client};
pub use response::{
    AnthropicBlock, AnthropicMessage, ChatCompletion, ChatMessage, Choice, MessageContent,
    ProviderResponse, Reasoning, TextSegment, collect_content_blocks,
};

use crate::error::{ForgeError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "openai")]
    OpenAi,
}

impl ProviderKind {
    /// Whether support for this provider was compiled into the binary.
    pub fn is_available(self) -> bool {
        match self {
            ProviderKind::Anthropic => cfg!(feature = "anthropic"),
            ProviderKind::OpenAi => cfg!(feature = "openai"),
        }
    }

    /// Guess the provider from a base URL or model identifier.
    pub fn detect(base_url: Option<&str>, model_name: &str) -> Option<Self> {
        if let Some(url) = base_url.map(str::to_ascii_lowercase) {
            if url.contains("anthropic") {
                return Some(ProviderKind::Anthropic);
            }
            if url.contains("openai") {
                return Some(ProviderKind::OpenAi);
            }
        }

        let model = model_name.to_ascii_lowercase();
        if model.starts_with("claude") {
            Some(ProviderKind::Anthropic)
        } else if ["gpt-", "o1", "o3", "o4"]
            .iter()
            .any(|prefix| model.starts_with(prefix))
        {
            Some(ProviderKind::OpenAi)
        } else {
            None
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Anthropic => write!(f, "anthropic"),
            ProviderKind::OpenAi => write!(f, "openai"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = ForgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Ok(ProviderKind::Anthropic),
            "openai" => Ok(ProviderKind::OpenAi),
            other => Err(ForgeError::Config(format!(
                "unknown provider '{}' (expected 'anthropic' or 'openai')",
                other
            ))),
        }
    }
}

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// A partial assistant turn the model continues from.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// Generation parameters for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    /// Maximum output tokens.
    pub max_tokens: u32,
    /// Sampling temperature; provider default when `None`.
    pub temperature: Option<f32>,
    /// Extra provider-specific body fields, merged in last.
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl GenerationParams {
    pub fn new(max_tokens: u32) -> Self {
        Self {
            max_tokens,
            temperature: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Kind of content block to collect from a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Text,
    Thinking,
}

/// A blocking chat model.
///
/// One call is one network round trip; implementations do not retry.
pub trait LanguageModel {
    /// Provider this model talks to.
    fn provider(&self) -> ProviderKind;

    /// Model identifier sent with each request.
    fn model_name(&self) -> &str;

    /// Send `messages` and wait for the complete response.
    fn create_message(
        &self,
        messages: &[Message],
        params: &GenerationParams,
    ) -> Result<ProviderResponse>;
}
