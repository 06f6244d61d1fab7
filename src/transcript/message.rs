//! Message records

use crate::agent::AgentSlot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    Human,
    Assistant,
}

/// Token usage reported by the completion provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UsageData {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MessageMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageData>,
}

/// One utterance in the transcript. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentSlot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
}

impl Message {
    pub fn is_from(&self, agent: AgentSlot) -> bool {
        self.role == Role::Assistant && self.agent == Some(agent)
    }
}

/// A message as submitted to the store, before validation
///
/// Every field is optional so the store can enforce its own repair-or-reject
/// policy at the boundary.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct MessageDraft {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub agent: Option<AgentSlot>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub metadata: Option<MessageMetadata>,
}

impl MessageDraft {
    pub fn assistant(agent: AgentSlot, content: impl Into<String>) -> Self {
        Self {
            role: Some(Role::Assistant),
            content: Some(content.into()),
            agent: Some(agent),
            ..Self::default()
        }
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: Some(Role::Human),
            content: Some(content.into()),
            ..Self::default()
        }
    }

    #[allow(dead_code)] // Constructor for API completeness
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Some(Role::System),
            content: Some(content.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: MessageMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
