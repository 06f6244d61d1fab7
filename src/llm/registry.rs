//! Registry of configured LLM providers

use super::openai::{OPENAI_BASE_URL, OPENROUTER_BASE_URL};
use super::{
    all_models, AnthropicService, LlmError, LlmService, LoggingService, OpenAIService, Provider,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

const FALLBACK_MODEL: &str = "gpt-4o-mini";

/// Configuration for LLM providers
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub anthropic_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    /// Override for OpenAI-compatible deployments
    pub openai_base_url: Option<String>,
    pub openrouter_api_key: Option<String>,
    /// Model new sessions start with
    pub default_model: Option<String>,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        let non_empty = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            anthropic_api_key: non_empty("ANTHROPIC_API_KEY"),
            openai_api_key: non_empty("OPENAI_API_KEY"),
            openai_base_url: non_empty("OPENAI_BASE_URL"),
            openrouter_api_key: non_empty("OPENROUTER_API_KEY"),
            default_model: non_empty("DEFAULT_MODEL"),
        }
    }
}

/// Catalog model exposed to clients
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub provider: String,
    pub description: String,
}

/// One service per configured provider, selected by model id
pub struct ModelRegistry {
    services: HashMap<Provider, Arc<dyn LlmService>>,
    default_model: String,
}

impl ModelRegistry {
    pub fn new(config: &LlmConfig) -> Self {
        let mut services: HashMap<Provider, Arc<dyn LlmService>> = HashMap::new();

        if let Some(key) = &config.anthropic_api_key {
            Self::register(&mut services, AnthropicService::new(key.clone()));
        }
        if let Some(key) = &config.openai_api_key {
            let base = config.openai_base_url.as_deref().unwrap_or(OPENAI_BASE_URL);
            Self::register(
                &mut services,
                OpenAIService::new(key.clone(), base, Provider::OpenAI),
            );
        }
        if let Some(key) = &config.openrouter_api_key {
            Self::register(
                &mut services,
                OpenAIService::new(key.clone(), OPENROUTER_BASE_URL, Provider::OpenRouter),
            );
        }

        let default_model = config
            .default_model
            .clone()
            .or_else(|| {
                // First catalog model whose provider is configured
                all_models()
                    .iter()
                    .find(|def| services.contains_key(&def.provider))
                    .map(|def| def.id.to_string())
            })
            .unwrap_or_else(|| FALLBACK_MODEL.to_string());

        tracing::info!(
            providers = ?services.keys().map(|p| p.display_name()).collect::<Vec<_>>(),
            default_model = %default_model,
            "Model registry initialized"
        );

        Self {
            services,
            default_model,
        }
    }

    fn register<S: LlmService + 'static>(
        services: &mut HashMap<Provider, Arc<dyn LlmService>>,
        service: Result<S, LlmError>,
    ) {
        match service {
            Ok(service) => {
                let provider = service.provider();
                services.insert(provider, Arc::new(LoggingService::new(Arc::new(service))));
            }
            Err(e) => tracing::warn!(error = %e, "Failed to initialize LLM provider"),
        }
    }

    /// Resolve the service for a model id
    pub fn service_for(&self, model_id: &str) -> Result<Arc<dyn LlmService>, LlmError> {
        let provider = Provider::for_model(model_id);
        self.services.get(&provider).cloned().ok_or_else(|| {
            LlmError::auth(format!(
                "{} is not configured for model {model_id} (set {})",
                provider.display_name(),
                provider.api_key_env_var()
            ))
        })
    }

    /// Get the default model ID
    pub fn default_model_id(&self) -> &str {
        &self.default_model
    }

    /// Check if any provider is available
    pub fn has_models(&self) -> bool {
        !self.services.is_empty()
    }

    /// Catalog models whose provider is configured
    pub fn available_model_info(&self) -> Vec<ModelInfo> {
        all_models()
            .iter()
            .filter(|def| self.services.contains_key(&def.provider))
            .map(|def| ModelInfo {
                id: def.id.to_string(),
                provider: def.provider.display_name().to_string(),
                description: def.description.to_string(),
            })
            .collect()
    }
}
