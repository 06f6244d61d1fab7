//! Property-based tests for LLM provider translation layers
//!
//! These tests verify that the translation between our internal types
//! and provider wire formats preserves key invariants:
//! - Empty and whitespace-only completions are rejected
//! - Ok responses always carry non-empty text
//! - Dialogue order and content survive translation
//! - Anthropic requests always open with a user turn and alternate

use super::anthropic::{
    AnthropicContentBlock, AnthropicResponse, AnthropicUsage, CONVERSATION_OPENER,
};
use super::openai::{OpenAIChoice, OpenAIMessage, OpenAIResponse, OpenAIUsage};
use super::types::{LlmMessage, LlmRequest, MessageRole};
use super::{AnthropicService, OpenAIService};
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

fn arb_role() -> impl Strategy<Value = MessageRole> {
    prop_oneof![Just(MessageRole::User), Just(MessageRole::Assistant)]
}

fn arb_message() -> impl Strategy<Value = LlmMessage> {
    (arb_role(), "[a-zA-Z0-9 _.!?,]{1,80}").prop_map(|(role, content)| LlmMessage { role, content })
}

/// A dialogue that alternates roles, as the context builder produces
fn arb_alternating_dialogue() -> impl Strategy<Value = Vec<LlmMessage>> {
    (arb_role(), prop::collection::vec("[a-zA-Z0-9 ]{1,40}", 0..12)).prop_map(|(first, texts)| {
        texts
            .into_iter()
            .enumerate()
            .map(|(i, content)| {
                let role = match (first, i % 2) {
                    (MessageRole::User, 0) | (MessageRole::Assistant, 1) => MessageRole::User,
                    _ => MessageRole::Assistant,
                };
                LlmMessage { role, content }
            })
            .collect()
    })
}

fn arb_request(messages: impl Strategy<Value = Vec<LlmMessage>>) -> impl Strategy<Value = LlmRequest> {
    (
        messages,
        proptest::option::of("[a-zA-Z ]{1,40}"),
        1u32..4096,
        0.0f32..=2.0,
    )
        .prop_map(|(messages, system, max_tokens, temperature)| LlmRequest {
            model: "test-model".to_string(),
            system,
            messages,
            max_tokens,
            temperature,
        })
}

fn make_openai_response(content: Option<String>) -> OpenAIResponse {
    OpenAIResponse {
        choices: vec![OpenAIChoice {
            message: OpenAIMessage {
                role: "assistant".to_string(),
                content,
            },
        }],
        usage: Some(OpenAIUsage {
            prompt_tokens: 10,
            completion_tokens: 5,
        }),
    }
}

fn make_anthropic_response(texts: Vec<String>) -> AnthropicResponse {
    AnthropicResponse {
        content: texts
            .into_iter()
            .map(|text| AnthropicContentBlock::Text { text })
            .collect(),
        usage: AnthropicUsage {
            input_tokens: 10,
            output_tokens: 5,
        },
    }
}

// ============================================================================
// Response validation
// ============================================================================

proptest! {
    /// Whitespace-only completions are failures for both providers
    #[test]
    fn prop_blank_completions_rejected(blank in "[ \t\n]{0,10}") {
        prop_assert!(OpenAIService::normalize_response(make_openai_response(Some(blank.clone()))).is_err());
        prop_assert!(AnthropicService::normalize_response(make_anthropic_response(vec![blank])).is_err());
    }

    /// Ok implies non-empty, trimmed text
    #[test]
    fn prop_normalize_ok_implies_nonempty(text in "[a-zA-Z0-9 ]{0,100}") {
        if let Ok(resp) = OpenAIService::normalize_response(make_openai_response(Some(text.clone()))) {
            prop_assert!(!resp.text.is_empty());
            prop_assert_eq!(resp.text.trim(), resp.text.as_str());
        }
        if let Ok(resp) = AnthropicService::normalize_response(make_anthropic_response(vec![text])) {
            prop_assert!(!resp.text.is_empty());
        }
    }

    /// Anthropic text blocks are concatenated in order
    #[test]
    fn prop_anthropic_blocks_concatenate(texts in prop::collection::vec("[a-z]{1,10}", 1..5)) {
        let expected = texts.concat();
        let resp = AnthropicService::normalize_response(make_anthropic_response(texts)).unwrap();
        prop_assert_eq!(resp.text, expected);
    }
}

// ============================================================================
// Request translation
// ============================================================================

proptest! {
    /// OpenAI translation keeps every message, in order, after the optional system prompt
    #[test]
    fn prop_openai_translate_preserves_dialogue(
        request in arb_request(prop::collection::vec(arb_message(), 0..10))
    ) {
        let translated = OpenAIService::translate_request(&request);
        let offset = usize::from(request.system.is_some());
        prop_assert_eq!(translated.messages.len(), request.messages.len() + offset);
        for (wire, msg) in translated.messages.iter().skip(offset).zip(&request.messages) {
            prop_assert_eq!(wire.role.as_str(), msg.role.as_str());
            prop_assert_eq!(wire.content.as_deref(), Some(msg.content.as_str()));
        }
    }

    /// Anthropic requests open with a user turn and strictly alternate
    #[test]
    fn prop_anthropic_translate_alternates(
        request in arb_request(prop::collection::vec(arb_message(), 0..10))
    ) {
        let translated = AnthropicService::translate_request(&request);
        prop_assert!(!translated.messages.is_empty());
        prop_assert_eq!(translated.messages[0].role.as_str(), "user");
        for pair in translated.messages.windows(2) {
            prop_assert_ne!(&pair[0].role, &pair[1].role);
        }
        prop_assert!(translated.temperature <= 1.0);
    }

    /// Alternating dialogues pass through unchanged apart from the opener
    #[test]
    fn prop_anthropic_alternating_dialogue_kept(
        request in arb_request(arb_alternating_dialogue())
    ) {
        let translated = AnthropicService::translate_request(&request);
        let needs_opener = request.messages.first().map_or(true, |m| m.role != MessageRole::User);
        let offset = usize::from(needs_opener);
        prop_assert_eq!(translated.messages.len(), request.messages.len() + offset);
        if needs_opener {
            prop_assert_eq!(translated.messages[0].content.as_str(), CONVERSATION_OPENER);
        }
        for (wire, msg) in translated.messages.iter().skip(offset).zip(&request.messages) {
            prop_assert_eq!(&wire.content, &msg.content);
        }
    }

    /// Translated requests always serialize
    #[test]
    fn prop_translated_request_serializes(
        request in arb_request(prop::collection::vec(arb_message(), 0..10))
    ) {
        prop_assert!(serde_json::to_string(&OpenAIService::translate_request(&request)).is_ok());
        prop_assert!(serde_json::to_string(&AnthropicService::translate_request(&request)).is_ok());
    }
}
