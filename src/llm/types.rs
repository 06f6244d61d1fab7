//! Common types for LLM interactions

use crate::agent::AgentConfig;
use crate::transcript::{ContextEntry, ContextRole, UsageData};

/// Chat completion request, provider-neutral
#[derive(Debug, Clone, PartialEq)]
pub struct LlmRequest {
    pub model: String,
    pub system: Option<String>,
    pub messages: Vec<LlmMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl LlmRequest {
    /// Build the request for one agent's turn from its config and reframed context
    pub fn for_turn(config: &AgentConfig, context: &[ContextEntry]) -> Self {
        let system = Some(config.system_prompt.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        Self {
            model: config.model.clone(),
            system,
            messages: context.iter().map(LlmMessage::from).collect(),
            max_tokens: config.params.max_tokens,
            temperature: config.params.temperature,
        }
    }
}

/// Message in conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmMessage {
    pub role: MessageRole,
    pub content: String,
}

impl LlmMessage {
    #[cfg(test)]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    #[cfg(test)]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

impl From<&ContextEntry> for LlmMessage {
    fn from(entry: &ContextEntry) -> Self {
        let role = match entry.role {
            ContextRole::Assistant => MessageRole::Assistant,
            ContextRole::User => MessageRole::User,
        };
        Self {
            role,
            content: entry.content.clone(),
        }
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// LLM response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmResponse {
    pub text: String,
    pub usage: Usage,
}

/// Usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Usage {
    pub fn is_zero(&self) -> bool {
        self.input_tokens == 0 && self.output_tokens == 0
    }
}

impl From<Usage> for UsageData {
    fn from(usage: Usage) -> Self {
        UsageData {
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
        }
    }
}
