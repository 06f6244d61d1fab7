//! Effects produced by state transitions

use crate::agent::{AgentConfig, AgentSlot, Voice};
use crate::transcript::MessageDraft;
use std::time::Duration;

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Append a message to the transcript and notify clients
    AppendMessage { draft: MessageDraft },

    SetTyping { agent: AgentSlot, on: bool },
    SetSpeaking { agent: AgentSlot, on: bool },
    /// Reset every typing and speaking flag
    ClearPresence,

    /// Set or clear the user-visible error
    SetError { message: Option<String> },

    /// Empty the transcript
    ClearTranscript,

    /// Record that at least one message was narrated
    MarkNarrated,

    /// Store a validated agent config for subsequent turns
    ApplyAgentConfig { slot: AgentSlot, config: AgentConfig },

    /// Build context and call the completion service (spawns as background task)
    RequestGeneration { agent: AgentSlot, turn: u32 },

    /// Synthesize and play a message (spawns as background task)
    RequestNarration {
        agent: AgentSlot,
        message_id: String,
        text: String,
        voice: Voice,
    },

    /// Arm the turn timer
    ScheduleTurn {
        agent: AgentSlot,
        turn: u32,
        delay: Duration,
    },

    CancelTimer,
    AbortGeneration,
    AbortNarration,
}

impl Effect {
    /// Cancel every outstanding timer and request
    pub fn abort_all() -> [Effect; 3] {
        [
            Effect::CancelTimer,
            Effect::AbortGeneration,
            Effect::AbortNarration,
        ]
    }

    pub fn typing(agent: AgentSlot, on: bool) -> Self {
        Effect::SetTyping { agent, on }
    }

    pub fn speaking(agent: AgentSlot, on: bool) -> Self {
        Effect::SetSpeaking { agent, on }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Effect::SetError {
            message: Some(message.into()),
        }
    }
}
