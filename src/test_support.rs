use crate::error::{ForgeError, Result};
use crate::llm::{
    AnthropicBlock, AnthropicMessage, ChatCompletion, ChatMessage, Choice, GenerationParams,
    LanguageModel, Message, MessageContent, ProviderKind, ProviderResponse, Reasoning,
};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::{LazyLock, Mutex, MutexGuard};

static ENV_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

/// Sets process environment variables for the lifetime of the guard.
///
/// The environment is global, so the guard holds a lock; tests using it
/// should still be marked `#[serial]`.
pub(crate) struct EnvGuard {
    saved: Vec<(String, Option<String>)>,
    _lock: MutexGuard<'static, ()>,
}

impl EnvGuard {
    pub(crate) fn new(vars: &[(&str, Option<&str>)]) -> Self {
        let lock = ENV_LOCK.lock().unwrap_or_else(|poison| poison.into_inner());
        let mut saved = Vec::new();
        for (key, value) in vars {
            saved.push((key.to_string(), std::env::var(key).ok()));
            set_env(key, *value);
        }
        Self { saved, _lock: lock }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in self.saved.drain(..).rev() {
            set_env(&key, value.as_deref());
        }
    }
}

fn set_env(key: &str, value: Option<&str>) {
    // SAFETY: callers hold ENV_LOCK and run under #[serial].
    unsafe {
        match value {
            Some(value) => std::env::set_var(key, value),
            None => std::env::remove_var(key),
        }
    }
}

/// One request seen by [`ScriptedModel`].
#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub messages: Vec<Message>,
    pub params: GenerationParams,
}

/// A `LanguageModel` that replays queued responses in order.
pub(crate) struct ScriptedModel {
    provider: ProviderKind,
    responses: RefCell<VecDeque<Result<ProviderResponse>>>,
    requests: RefCell<Vec<RecordedRequest>>,
}

impl ScriptedModel {
    pub(crate) fn new(responses: Vec<ProviderResponse>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    pub(crate) fn with_results(results: Vec<Result<ProviderResponse>>) -> Self {
        Self {
            provider: ProviderKind::Anthropic,
            responses: RefCell::new(results.into()),
            requests: RefCell::new(Vec::new()),
        }
    }

    /// Reply with plain text blocks, one response per entry.
    pub(crate) fn replying(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|text| text_response(text)).collect())
    }

    pub(crate) fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.borrow().clone()
    }

    pub(crate) fn remaining(&self) -> usize {
        self.responses.borrow().len()
    }
}

impl LanguageModel for ScriptedModel {
    fn provider(&self) -> ProviderKind {
        self.provider
    }

    fn model_name(&self) -> &str {
        "scripted-model"
    }

    fn create_message(
        &self,
        messages: &[Message],
        params: &GenerationParams,
    ) -> Result<ProviderResponse> {
        self.requests.borrow_mut().push(RecordedRequest {
            messages: messages.to_vec(),
            params: params.clone(),
        });
        self.responses.borrow_mut().pop_front().unwrap_or_else(|| {
            Err(ForgeError::Provider(
                "scripted model has no responses left".to_string(),
            ))
        })
    }
}

/// Anthropic response with a single text block.
pub(crate) fn text_response(text: &str) -> ProviderResponse {
    anthropic_response(None, text)
}

/// Anthropic response with an optional thinking block followed by text.
pub(crate) fn anthropic_response(thinking: Option<&str>, text: &str) -> ProviderResponse {
    let mut content = Vec::new();
    if let Some(thinking) = thinking {
        content.push(AnthropicBlock {
            kind: "thinking".to_string(),
            text: None,
            thinking: Some(thinking.to_string()),
        });
    }
    content.push(AnthropicBlock {
        kind: "text".to_string(),
        text: Some(text.to_string()),
        thinking: None,
    });
    ProviderResponse::Anthropic(AnthropicMessage { content })
}

/// OpenAI-style response with string content and optional string reasoning.
pub(crate) fn openai_response(reasoning: Option<&str>, content: &str) -> ProviderResponse {
    ProviderResponse::OpenAi(ChatCompletion {
        choices: vec![Choice {
            message: Some(ChatMessage {
                content: Some(MessageContent::Text(content.to_string())),
                reasoning_details: None,
                reasoning: reasoning.map(|r| Reasoning::Text(r.to_string())),
            }),
        }],
    })
}
