//! Agent configuration
//!
//! The two conversational participants are identified by a closed
//! [`AgentSlot`] enum; configuration is looked up through [`AgentPair::get`],
//! never by string key.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Identity of one of the two agents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentSlot {
    #[serde(alias = "ai1")]
    AgentA,
    #[serde(alias = "ai2")]
    AgentB,
}

impl AgentSlot {
    pub const ALL: [AgentSlot; 2] = [AgentSlot::AgentA, AgentSlot::AgentB];

    /// The agent that speaks after this one
    pub fn other(self) -> Self {
        match self {
            AgentSlot::AgentA => AgentSlot::AgentB,
            AgentSlot::AgentB => AgentSlot::AgentA,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AgentSlot::AgentA => "agent-a",
            AgentSlot::AgentB => "agent-b",
        }
    }

    /// Parse a slot from a path segment, accepting the legacy `ai1`/`ai2` names
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "agent-a" | "ai1" => Some(AgentSlot::AgentA),
            "agent-b" | "ai2" => Some(AgentSlot::AgentB),
            _ => None,
        }
    }
}

impl fmt::Display for AgentSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who opens a conversation
///
/// Only the two agent-initiated directions are driven by the engine. The
/// human-initiated variants are accepted on the wire and rejected at start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    #[serde(alias = "ai1-to-ai2")]
    AgentAOpens,
    #[serde(alias = "ai2-to-ai1")]
    AgentBOpens,
    #[serde(alias = "human-to-ai1")]
    HumanToAgentA,
    #[serde(alias = "human-to-ai2")]
    HumanToAgentB,
}

impl Direction {
    /// The agent the seed message is attributed to, if the engine drives this direction
    pub fn starter(self) -> Option<AgentSlot> {
        match self {
            Direction::AgentAOpens => Some(AgentSlot::AgentA),
            Direction::AgentBOpens => Some(AgentSlot::AgentB),
            Direction::HumanToAgentA | Direction::HumanToAgentB => None,
        }
    }
}

/// Supported narration voices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
    #[default]
    Alloy,
    Echo,
    Fable,
    Onyx,
    Nova,
    Shimmer,
}

impl Voice {
    pub const ALL: [Voice; 6] = [
        Voice::Alloy,
        Voice::Echo,
        Voice::Fable,
        Voice::Onyx,
        Voice::Nova,
        Voice::Shimmer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Voice::Alloy => "alloy",
            Voice::Echo => "echo",
            Voice::Fable => "fable",
            Voice::Onyx => "onyx",
            Voice::Nova => "nova",
            Voice::Shimmer => "shimmer",
        }
    }
}

/// Narration settings for one agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NarrationConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub voice: Voice,
}

impl NarrationConfig {
    /// The voice to narrate with, or `None` when narration is off
    pub fn voice_if_enabled(&self) -> Option<Voice> {
        self.enabled.then_some(self.voice)
    }
}

pub const DEFAULT_MAX_TOKENS: u32 = 1024;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const MAX_TEMPERATURE: f32 = 2.0;

/// Sampling parameters sent with every completion request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

impl GenerationParams {
    pub fn validate(&self) -> Result<(), AgentConfigError> {
        if self.max_tokens == 0 {
            return Err(AgentConfigError::InvalidMaxTokens);
        }
        if !self.temperature.is_finite() || !(0.0..=MAX_TEMPERATURE).contains(&self.temperature) {
            return Err(AgentConfigError::InvalidTemperature(self.temperature));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AgentConfigError {
    #[error("Agent name must not be empty")]
    EmptyName,
    #[error("Agent model must not be empty")]
    EmptyModel,
    #[error("max_tokens must be a positive integer")]
    InvalidMaxTokens,
    #[error("temperature must be between 0.0 and 2.0, got {0}")]
    InvalidTemperature(f32),
}

/// Configuration for one conversational participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub name: String,
    /// Opaque to the engine; resolved to a provider by the LLM registry
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub params: GenerationParams,
    #[serde(default)]
    pub narration: NarrationConfig,
}

impl AgentConfig {
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            system_prompt: String::new(),
            params: GenerationParams::default(),
            narration: NarrationConfig::default(),
        }
    }

    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    #[cfg(test)]
    #[must_use]
    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    #[must_use]
    pub fn with_narration(mut self, voice: Voice) -> Self {
        self.narration = NarrationConfig {
            enabled: true,
            voice,
        };
        self
    }

    pub fn has_model(&self) -> bool {
        !self.model.trim().is_empty()
    }

    /// Validate and normalize a config received from a client
    pub fn validated(mut self) -> Result<Self, AgentConfigError> {
        self.name = self.name.trim().to_string();
        self.model = self.model.trim().to_string();
        if self.name.is_empty() {
            return Err(AgentConfigError::EmptyName);
        }
        if self.model.is_empty() {
            return Err(AgentConfigError::EmptyModel);
        }
        self.params.validate()?;
        Ok(self)
    }

    fn default_for(slot: AgentSlot, model: &str) -> Self {
        let (name, prompt) = match slot {
            AgentSlot::AgentA => (
                "Agent A",
                "You are a curious conversationalist. Keep replies short and ask follow-up questions.",
            ),
            AgentSlot::AgentB => (
                "Agent B",
                "You are a thoughtful conversationalist. Keep replies short and offer your own perspective.",
            ),
        };
        AgentConfig::new(name, model).with_system_prompt(prompt)
    }
}

/// Both agents' configuration, addressed by slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentPair {
    pub agent_a: AgentConfig,
    pub agent_b: AgentConfig,
}

impl AgentPair {
    #[allow(dead_code)] // Constructor for API completeness
    pub fn new(agent_a: AgentConfig, agent_b: AgentConfig) -> Self {
        Self { agent_a, agent_b }
    }

    /// Default personas, both on the given model
    pub fn with_default_model(model: &str) -> Self {
        Self {
            agent_a: AgentConfig::default_for(AgentSlot::AgentA, model),
            agent_b: AgentConfig::default_for(AgentSlot::AgentB, model),
        }
    }

    pub fn get(&self, slot: AgentSlot) -> &AgentConfig {
        match slot {
            AgentSlot::AgentA => &self.agent_a,
            AgentSlot::AgentB => &self.agent_b,
        }
    }

    /// Replace one agent's config after validating it
    pub fn set(&mut self, slot: AgentSlot, config: AgentConfig) -> Result<(), AgentConfigError> {
        let config = config.validated()?;
        match slot {
            AgentSlot::AgentA => self.agent_a = config,
            AgentSlot::AgentB => self.agent_b = config,
        }
        Ok(())
    }

    /// First slot without a model, if any
    pub fn missing_model(&self) -> Option<AgentSlot> {
        AgentSlot::ALL
            .into_iter()
            .find(|slot| !self.get(*slot).has_model())
    }
}
