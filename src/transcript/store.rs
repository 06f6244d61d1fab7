//! Per-session conversation state
//!
//! Holds the ordered message log plus presence flags. The session runtime is
//! the only writer; everything else reads snapshots.

use super::message::{Message, MessageDraft, Role};
use crate::agent::AgentSlot;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Message role is required")]
    MissingRole,
    #[error("Message content must not be empty")]
    EmptyContent,
}

/// Coarse lifecycle exposed to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    #[default]
    Idle,
    Active,
    Stopped,
}

/// One boolean per agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AgentFlags {
    pub agent_a: bool,
    pub agent_b: bool,
}

impl AgentFlags {
    pub fn get(&self, agent: AgentSlot) -> bool {
        match agent {
            AgentSlot::AgentA => self.agent_a,
            AgentSlot::AgentB => self.agent_b,
        }
    }

    fn set(&mut self, agent: AgentSlot, on: bool) {
        match agent {
            AgentSlot::AgentA => self.agent_a = on,
            AgentSlot::AgentB => self.agent_b = on,
        }
    }

    pub fn any(&self) -> bool {
        self.agent_a || self.agent_b
    }
}

/// Conversation state for one mounted conversation panel
#[derive(Debug, Clone, Serialize)]
pub struct ConversationState {
    messages: Vec<Message>,
    lifecycle: Lifecycle,
    is_active: bool,
    current_speaker: Option<AgentSlot>,
    typing: AgentFlags,
    speaking: AgentFlags,
    error: Option<String>,
    last_activity: DateTime<Utc>,
    has_audio: bool,
    max_messages: usize,
}

impl ConversationState {
    pub fn new(max_messages: usize) -> Self {
        Self {
            messages: Vec::new(),
            lifecycle: Lifecycle::Idle,
            is_active: false,
            current_speaker: None,
            typing: AgentFlags::default(),
            speaking: AgentFlags::default(),
            error: None,
            last_activity: Utc::now(),
            has_audio: false,
            max_messages: max_messages.max(1),
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn current_speaker(&self) -> Option<AgentSlot> {
        self.current_speaker
    }

    pub fn typing(&self) -> AgentFlags {
        self.typing
    }

    pub fn speaking(&self) -> AgentFlags {
        self.speaking
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    pub fn has_audio(&self) -> bool {
        self.has_audio
    }

    /// Validate and append a message, returning the stored record
    ///
    /// Drafts without a role or with blank content are rejected. Assistant
    /// drafts without an agent tag are attributed to agent-a.
    pub fn append(&mut self, draft: MessageDraft) -> Result<Message, StoreError> {
        let role = draft.role.ok_or(StoreError::MissingRole)?;
        let content = draft
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or(StoreError::EmptyContent)?;

        let agent = match (role, draft.agent) {
            (Role::Assistant, None) => {
                tracing::warn!(
                    message_id = ?draft.id,
                    "Assistant message missing agent tag, attributing to agent-a"
                );
                Some(AgentSlot::AgentA)
            }
            (_, agent) => agent,
        };

        let message = Message {
            id: draft
                .id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            role,
            content,
            timestamp: draft.timestamp.unwrap_or_else(Utc::now),
            agent,
            model: draft.model,
            metadata: draft.metadata,
        };

        self.messages.push(message.clone());
        self.last_activity = Utc::now();
        self.enforce_cap(self.max_messages);
        Ok(message)
    }

    /// Drop the oldest messages so at most `max` remain
    pub fn enforce_cap(&mut self, max: usize) {
        if self.messages.len() > max {
            let excess = self.messages.len() - max;
            self.messages.drain(..excess);
            tracing::debug!(evicted = excess, max, "Evicted oldest messages");
        }
    }

    /// Empty the log and reset presence, error and audio tracking
    pub fn clear(&mut self) {
        self.messages.clear();
        self.typing = AgentFlags::default();
        self.speaking = AgentFlags::default();
        self.current_speaker = None;
        self.error = None;
        self.has_audio = false;
        self.last_activity = Utc::now();
    }

    pub fn set_typing(&mut self, agent: AgentSlot, on: bool) {
        if on && !self.typing.get(agent) {
            self.current_speaker = Some(agent);
        }
        self.typing.set(agent, on);
    }

    pub fn set_speaking(&mut self, agent: AgentSlot, on: bool) {
        // Typing always precedes speaking within a turn, so an agent that is
        // still typing keeps the speaker slot.
        if on && !self.speaking.get(agent) && !self.typing.any() {
            self.current_speaker = Some(agent);
        }
        self.speaking.set(agent, on);
    }

    pub fn clear_presence(&mut self) {
        self.typing = AgentFlags::default();
        self.speaking = AgentFlags::default();
        self.current_speaker = None;
    }

    pub fn set_lifecycle(&mut self, lifecycle: Lifecycle) {
        self.lifecycle = lifecycle;
        self.is_active = lifecycle == Lifecycle::Active;
        self.last_activity = Utc::now();
    }

    pub fn set_error(&mut self, error: Option<String>) {
        self.error = error;
    }

    pub fn mark_narrated(&mut self) {
        self.has_audio = true;
    }
}
