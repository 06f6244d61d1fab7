//! Provider routing and the model catalog
//!
//! Agent model ids are opaque strings; the provider is derived from the id
//! itself. The catalog only feeds the model picker and is not a whitelist.

use serde::Serialize;

/// LLM provider enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Anthropic,
    OpenAI,
    OpenRouter,
}

impl Provider {
    /// Route a model id to its provider
    ///
    /// `claude-*` goes to Anthropic, namespaced ids like `meta-llama/llama-3`
    /// go to `OpenRouter`, everything else to `OpenAI`.
    pub fn for_model(model_id: &str) -> Self {
        if model_id.starts_with("claude-") {
            Provider::Anthropic
        } else if model_id.contains('/') {
            Provider::OpenRouter
        } else {
            Provider::OpenAI
        }
    }

    /// Get the display name for this provider
    pub fn display_name(self) -> &'static str {
        match self {
            Provider::Anthropic => "Anthropic",
            Provider::OpenAI => "OpenAI",
            Provider::OpenRouter => "OpenRouter",
        }
    }

    /// Get the environment variable name for this provider's API key
    pub fn api_key_env_var(self) -> &'static str {
        match self {
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::OpenAI => "OPENAI_API_KEY",
            Provider::OpenRouter => "OPENROUTER_API_KEY",
        }
    }
}

/// Catalog entry
#[derive(Debug, Clone)]
pub struct ModelDef {
    pub id: &'static str,
    pub provider: Provider,
    pub description: &'static str,
}

/// Get all catalog model definitions
pub fn all_models() -> &'static [ModelDef] {
    &[
        // Anthropic models
        ModelDef {
            id: "claude-sonnet-4-5",
            provider: Provider::Anthropic,
            description: "Claude Sonnet 4.5 (balanced performance)",
        },
        ModelDef {
            id: "claude-haiku-4-5",
            provider: Provider::Anthropic,
            description: "Claude Haiku 4.5 (fast, efficient)",
        },
        ModelDef {
            id: "claude-opus-4-1",
            provider: Provider::Anthropic,
            description: "Claude Opus 4.1 (most capable, slower)",
        },
        // OpenAI models
        ModelDef {
            id: "gpt-4o",
            provider: Provider::OpenAI,
            description: "GPT-4o (balanced, multimodal)",
        },
        ModelDef {
            id: "gpt-4o-mini",
            provider: Provider::OpenAI,
            description: "GPT-4o Mini (fast, efficient)",
        },
        ModelDef {
            id: "gpt-4.1",
            provider: Provider::OpenAI,
            description: "GPT-4.1 (long context)",
        },
        // OpenRouter models
        ModelDef {
            id: "meta-llama/llama-3.3-70b-instruct",
            provider: Provider::OpenRouter,
            description: "Llama 3.3 70B via OpenRouter",
        },
        ModelDef {
            id: "mistralai/mistral-large",
            provider: Provider::OpenRouter,
            description: "Mistral Large via OpenRouter",
        },
        ModelDef {
            id: "google/gemini-2.5-flash",
            provider: Provider::OpenRouter,
            description: "Gemini 2.5 Flash via OpenRouter",
        },
    ]
}
