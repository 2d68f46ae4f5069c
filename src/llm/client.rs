//! Blocking HTTP client for both providers.

use super::{GenerationParams, LanguageModel, Message, ProviderKind, ProviderResponse, Role};
use crate::config::{ENV_ANTHROPIC_API_KEY, ENV_MODEL_NAME, ENV_OPENAI_API_KEY, LlmConfig};
use crate::error::{ForgeError, Result};
use reqwest::blocking::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info};

const ANTHROPIC_DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// A provider-bound client ready to send requests.
#[derive(Debug, Clone)]
pub struct LlmClient {
    http: Client,
    provider: ProviderKind,
    model_name: String,
    api_key: String,
    base_url: String,
}

/// Everything [`ensure_client`] accepts.
#[derive(Debug)]
pub enum ClientSource {
    /// An already-wrapped client; returned unchanged.
    Ready(LlmClient),
    /// Resolved configuration; credentials are checked here.
    Config(LlmConfig),
    /// A caller-built HTTP client. When `provider` is `None` it is
    /// detected from `base_url` or `model_name`.
    Http {
        http: Client,
        api_key: String,
        model_name: String,
        base_url: Option<String>,
        provider: Option<ProviderKind>,
    },
}

/// Normalize any accepted client source into an [`LlmClient`].
///
/// Wrapping is idempotent: a `Ready` client comes back as-is.
pub fn ensure_client(source: ClientSource) -> Result<LlmClient> {
    match source {
        ClientSource::Ready(client) => Ok(client),
        ClientSource::Config(config) => LlmClient::from_config(&config),
        ClientSource::Http {
            http,
            api_key,
            model_name,
            base_url,
            provider,
        } => {
            let provider = match provider {
                Some(provider) => provider,
                None => ProviderKind::detect(base_url.as_deref(), &model_name).ok_or_else(|| {
                    ForgeError::ProviderMismatch(format!(
                        "base URL {:?} and model '{}' match neither anthropic nor openai",
                        base_url.as_deref().unwrap_or("<default>"),
                        model_name
                    ))
                })?,
            };
            LlmClient::from_parts(http, provider, model_name, api_key, base_url)
        }
    }
}

impl LlmClient {
    /// Build a client from resolved configuration.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        ensure_available(config.provider)?;

        let model_name = config.model_name.clone().ok_or_else(|| {
            ForgeError::Config(format!(
                "{} is not set.\n\nFix: set llm.model_name in the config file or export {}.",
                ENV_MODEL_NAME, ENV_MODEL_NAME
            ))
        })?;

        let api_key = config.api_key.clone().ok_or_else(|| {
            let var = match config.provider {
                ProviderKind::Anthropic => ENV_ANTHROPIC_API_KEY,
                ProviderKind::OpenAi => ENV_OPENAI_API_KEY,
            };
            ForgeError::Config(format!(
                "{} is not set.\n\nFix: set llm.api_key in the config file or export {}.",
                var, var
            ))
        })?;

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ForgeError::Config(format!("failed to build HTTP client: {}", e)))?;

        Self::from_parts(
            http,
            config.provider,
            model_name,
            api_key,
            config.base_url.clone(),
        )
    }

    fn from_parts(
        http: Client,
        provider: ProviderKind,
        model_name: String,
        api_key: String,
        base_url: Option<String>,
    ) -> Result<Self> {
        ensure_available(provider)?;

        let base_url = base_url
            .unwrap_or_else(|| match provider {
                ProviderKind::Anthropic => ANTHROPIC_DEFAULT_BASE_URL.to_string(),
                ProviderKind::OpenAi => OPENAI_DEFAULT_BASE_URL.to_string(),
            })
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            http,
            provider,
            model_name,
            api_key,
            base_url,
        })
    }

    /// Full request URL for this provider.
    pub fn endpoint(&self) -> String {
        match self.provider {
            ProviderKind::Anthropic => format!("{}/v1/messages", self.base_url),
            ProviderKind::OpenAi => format!("{}/chat/completions", self.base_url),
        }
    }

    fn build_payload(&self, messages: &[Message], params: &GenerationParams) -> Value {
        match self.provider {
            ProviderKind::Anthropic => anthropic_payload(&self.model_name, messages, params),
            ProviderKind::OpenAi => openai_payload(&self.model_name, messages, params),
        }
    }
}

impl LanguageModel for LlmClient {
    fn provider(&self) -> ProviderKind {
        self.provider
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn create_message(
        &self,
        messages: &[Message],
        params: &GenerationParams,
    ) -> Result<ProviderResponse> {
        let payload = self.build_payload(messages, params);

        debug!(
            provider = %self.provider,
            model = %self.model_name,
            messages = messages.len(),
            max_tokens = params.max_tokens,
            "Sending request"
        );

        let request = self.http.post(self.endpoint()).json(&payload);
        let request = match self.provider {
            ProviderKind::Anthropic => request
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION),
            ProviderKind::OpenAi => request.bearer_auth(&self.api_key),
        };

        let response = request.send().map_err(|e| {
            ForgeError::Provider(format!("{} request failed: {}", self.provider, e))
        })?;

        let status = response.status();
        info!(provider = %self.provider, %status, "Received response");

        let body = response.text().map_err(|e| {
            ForgeError::Provider(format!(
                "{} API error {}, failed to read body: {}",
                self.provider, status, e
            ))
        })?;

        if !status.is_success() {
            return Err(ForgeError::Provider(format!(
                "{} API error {}: {}",
                self.provider, status, body
            )));
        }

        ProviderResponse::parse(self.provider, &body)
    }
}

fn ensure_available(provider: ProviderKind) -> Result<()> {
    if provider.is_available() {
        Ok(())
    } else {
        Err(ForgeError::ProviderUnavailable(provider.to_string()))
    }
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

/// Messages API body. System messages move to the top-level `system` field.
pub(super) fn anthropic_payload(
    model: &str,
    messages: &[Message],
    params: &GenerationParams,
) -> Value {
    let mut system_content = Vec::new();
    let mut regular_messages = Vec::new();

    for msg in messages {
        if msg.role == Role::System {
            system_content.push(msg.content.clone());
        } else {
            regular_messages.push(json!({
                "role": role_name(msg.role),
                "content": msg.content
            }));
        }
    }

    let mut payload = json!({
        "model": model,
        "messages": regular_messages,
        "max_tokens": params.max_tokens
    });

    if !system_content.is_empty() {
        payload["system"] = json!(system_content.join("\n\n"));
    }

    finish_payload(payload, params)
}

/// Chat completions body. Always requests split reasoning output.
pub(super) fn openai_payload(model: &str, messages: &[Message], params: &GenerationParams) -> Value {
    let messages: Vec<Value> = messages
        .iter()
        .map(|msg| {
            json!({
                "role": role_name(msg.role),
                "content": msg.content
            })
        })
        .collect();

    let payload = json!({
        "model": model,
        "messages": messages,
        "max_tokens": params.max_tokens,
        "reasoning_split": true
    });

    finish_payload(payload, params)
}

fn finish_payload(mut payload: Value, params: &GenerationParams) -> Value {
    if let Some(temperature) = params.temperature {
        payload["temperature"] = json!(temperature);
    }

    for (key, value) in &params.extra {
        payload[key] = value.clone();
    }

    payload
}
