//! Anthropic Claude provider implementation

use super::types::{LlmMessage, LlmRequest, LlmResponse, MessageRole, Usage};
use super::{LlmError, LlmService, Provider};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// The Messages API caps temperature at 1.0
const MAX_TEMPERATURE: f32 = 1.0;

/// Sent as the opening user turn when an agent's context starts with its own
/// message; the Messages API requires the first message to come from the user.
pub(super) const CONVERSATION_OPENER: &str = "(The conversation begins.)";

/// Anthropic service implementation
pub struct AnthropicService {
    client: Client,
    api_key: String,
}

impl AnthropicService {
    pub fn new(api_key: String) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, api_key })
    }

    pub(super) fn translate_request(request: &LlmRequest) -> AnthropicRequest {
        AnthropicRequest {
            model: request.model.clone(),
            max_tokens: request.max_tokens,
            temperature: request.temperature.min(MAX_TEMPERATURE),
            system: request.system.clone(),
            messages: Self::translate_messages(&request.messages),
        }
    }

    /// Translate messages, opening with a user turn and merging any
    /// consecutive same-role entries
    fn translate_messages(messages: &[LlmMessage]) -> Vec<AnthropicMessage> {
        let mut out: Vec<AnthropicMessage> = Vec::with_capacity(messages.len() + 1);

        if messages.first().map_or(true, |m| m.role != MessageRole::User) {
            out.push(AnthropicMessage {
                role: MessageRole::User.as_str().to_string(),
                content: CONVERSATION_OPENER.to_string(),
            });
        }

        for msg in messages {
            let role = msg.role.as_str();
            match out.last_mut() {
                Some(last) if last.role == role => {
                    last.content.push_str("\n\n");
                    last.content.push_str(&msg.content);
                }
                _ => out.push(AnthropicMessage {
                    role: role.to_string(),
                    content: msg.content.clone(),
                }),
            }
        }

        out
    }

    pub(super) fn normalize_response(resp: AnthropicResponse) -> Result<LlmResponse, LlmError> {
        let text = resp
            .content
            .into_iter()
            .filter_map(|block| match block {
                AnthropicContentBlock::Text { text } => Some(text),
                AnthropicContentBlock::Other => None,
            })
            .collect::<String>()
            .trim()
            .to_string();

        if text.is_empty() {
            return Err(LlmError::unknown("Empty completion"));
        }

        Ok(LlmResponse {
            text,
            usage: Usage {
                input_tokens: resp.usage.input_tokens,
                output_tokens: resp.usage.output_tokens,
            },
        })
    }
}

#[async_trait]
impl LlmService for AnthropicService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let anthropic_request = Self::translate_request(request);

        let response = self
            .client
            .post(MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&anthropic_request)
            .send()
            .await
            .map_err(|e| LlmError::from_reqwest(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<AnthropicErrorResponse>(&body)
                .map_or(body, |resp| resp.error.message);
            return Err(LlmError::from_status(status, &message));
        }

        let anthropic_response: AnthropicResponse = serde_json::from_str(&body).map_err(|e| {
            LlmError::unknown(format!("Failed to parse response: {e} - body: {body}"))
        })?;

        Self::normalize_response(anthropic_response)
    }

    fn provider(&self) -> Provider {
        Provider::Anthropic
    }
}

// Anthropic API types

#[derive(Debug, Serialize)]
pub(super) struct AnthropicRequest {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Serialize)]
pub(super) struct AnthropicMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(super) enum AnthropicContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub(super) struct AnthropicResponse {
    pub content: Vec<AnthropicContentBlock>,
    pub usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
pub(super) struct AnthropicUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorResponse {
    error: AnthropicError,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    message: String,
}
