//! Provider-native response shapes and content-block collection.

use super::{BlockKind, ProviderKind};
use crate::error::{ForgeError, Result};
use serde::{Deserialize, Serialize};

/// Anthropic messages API response (the parts we read).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnthropicMessage {
    #[serde(default)]
    pub content: Vec<AnthropicBlock>,
}

/// One typed Anthropic content block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnthropicBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
}

/// OpenAI-style chat completion response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletion {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: Option<ChatMessage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<MessageContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_details: Option<Vec<TextSegment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<Reasoning>,
}

/// Message content: a plain string, a list of typed parts, or a single
/// object carrying `text`. Variants are tried in that order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<TextSegment>),
    Object(TextSegment),
}

/// Free-form reasoning field: a string or a list of segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reasoning {
    Text(String),
    Segments(Vec<TextSegment>),
}

/// Any object with an optional `text` field; other keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextSegment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// A provider-native response. The variant records which provider sent it.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderResponse {
    Anthropic(AnthropicMessage),
    OpenAi(ChatCompletion),
}

impl ProviderResponse {
    /// Parse a raw JSON body returned by `provider`.
    pub fn parse(provider: ProviderKind, body: &str) -> Result<Self> {
        let parsed = match provider {
            ProviderKind::Anthropic => serde_json::from_str(body).map(ProviderResponse::Anthropic),
            ProviderKind::OpenAi => serde_json::from_str(body).map(ProviderResponse::OpenAi),
        };
        parsed.map_err(|e| {
            ForgeError::Provider(format!(
                "failed to parse {} response: {}",
                provider, e
            ))
        })
    }

    /// Provider that produced this response.
    pub fn provider(&self) -> ProviderKind {
        match self {
            ProviderResponse::Anthropic(_) => ProviderKind::Anthropic,
            ProviderResponse::OpenAi(_) => ProviderKind::OpenAi,
        }
    }

    /// Collect the non-empty blocks of `kind`, in response order.
    pub fn blocks(&self, kind: BlockKind) -> Vec<String> {
        match self {
            ProviderResponse::Anthropic(message) => anthropic_blocks(message, kind),
            ProviderResponse::OpenAi(completion) => openai_blocks(completion, kind),
        }
    }

    /// Blocks of `kind` joined with a blank line.
    pub fn joined(&self, kind: BlockKind) -> String {
        self.blocks(kind).join("\n\n")
    }
}

/// Collect the non-empty blocks of `kind` from `response`.
pub fn collect_content_blocks(response: &ProviderResponse, kind: BlockKind) -> Vec<String> {
    response.blocks(kind)
}

fn anthropic_blocks(message: &AnthropicMessage, kind: BlockKind) -> Vec<String> {
    let wanted = match kind {
        BlockKind::Text => "text",
        BlockKind::Thinking => "thinking",
    };

    message
        .content
        .iter()
        .filter(|block| block.kind == wanted)
        .filter_map(|block| match kind {
            BlockKind::Text => block.text.clone(),
            BlockKind::Thinking => block.thinking.clone(),
        })
        .filter(|value| !value.is_empty())
        .collect()
}

fn openai_blocks(completion: &ChatCompletion, kind: BlockKind) -> Vec<String> {
    let mut blocks = Vec::new();

    for message in completion.choices.iter().filter_map(|c| c.message.as_ref()) {
        match kind {
            BlockKind::Thinking => match &message.reasoning_details {
                Some(details) if !details.is_empty() => push_segments(&mut blocks, details),
                _ => match &message.reasoning {
                    Some(Reasoning::Text(text)) => push_text(&mut blocks, text),
                    Some(Reasoning::Segments(segments)) => push_segments(&mut blocks, segments),
                    None => {}
                },
            },
            BlockKind::Text => match &message.content {
                Some(MessageContent::Text(text)) => push_text(&mut blocks, text),
                Some(MessageContent::Parts(parts)) => push_segments(&mut blocks, parts),
                Some(MessageContent::Object(segment)) => {
                    push_segments(&mut blocks, std::slice::from_ref(segment))
                }
                None => {}
            },
        }
    }

    blocks
}

fn push_text(blocks: &mut Vec<String>, text: &str) {
    if !text.is_empty() {
        blocks.push(text.to_string());
    }
}

fn push_segments(blocks: &mut Vec<String>, segments: &[TextSegment]) {
    for segment in segments {
        if let Some(text) = &segment.text {
            push_text(blocks, text);
        }
    }
}
