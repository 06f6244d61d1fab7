//! Engine state types

use crate::agent::{AgentPair, AgentSlot};
use crate::llm::LlmErrorKind;
use crate::transcript::Lifecycle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_TURN_DELAY: Duration = Duration::from_millis(3000);
pub const DEFAULT_MAX_TURNS: u32 = 10;
pub const DEFAULT_MAX_MESSAGES: usize = 200;

/// Why a conversation stopped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StopReason {
    UserStopped,
    /// The turn budget was used up; not an error
    TurnLimitReached,
    GenerationFailed {
        message: String,
        error_kind: LlmErrorKind,
    },
    Teardown,
}

/// Turn engine state
///
/// `turn` counts accepted utterances so far; the seed is turn 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineState {
    /// No conversation has been started
    #[default]
    Idle,

    /// Waiting out the delay before `agent` speaks
    Scheduled {
        agent: AgentSlot,
        turn: u32,
        fire_at: DateTime<Utc>,
    },

    /// Completion request in flight for `agent`
    AwaitingGeneration { agent: AgentSlot, turn: u32 },

    /// Narrating the message `agent` just produced
    AwaitingNarration {
        agent: AgentSlot,
        turn: u32,
        message_id: String,
    },

    /// Terminal until the next explicit start
    Stopped { reason: StopReason, turns: u32 },
}

impl EngineState {
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            EngineState::Scheduled { .. }
                | EngineState::AwaitingGeneration { .. }
                | EngineState::AwaitingNarration { .. }
        )
    }

    pub fn lifecycle(&self) -> Lifecycle {
        match self {
            EngineState::Idle => Lifecycle::Idle,
            EngineState::Stopped { .. } => Lifecycle::Stopped,
            _ => Lifecycle::Active,
        }
    }

    /// Accepted utterances so far
    pub fn turns(&self) -> u32 {
        match self {
            EngineState::Idle => 0,
            EngineState::Scheduled { turn, .. }
            | EngineState::AwaitingGeneration { turn, .. }
            | EngineState::AwaitingNarration { turn, .. } => *turn,
            EngineState::Stopped { turns, .. } => *turns,
        }
    }

    /// Short name used in logs and SSE payloads
    pub fn name(&self) -> &'static str {
        match self {
            EngineState::Idle => "idle",
            EngineState::Scheduled { .. } => "scheduled",
            EngineState::AwaitingGeneration { .. } => "awaiting_generation",
            EngineState::AwaitingNarration { .. } => "awaiting_narration",
            EngineState::Stopped { .. } => "stopped",
        }
    }
}

/// Engine tunables, fixed for the life of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub turn_delay: Duration,
    /// Total utterances allowed, seed included
    pub max_turns: u32,
    pub max_messages: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            turn_delay: DEFAULT_TURN_DELAY,
            max_turns: DEFAULT_MAX_TURNS,
            max_messages: DEFAULT_MAX_MESSAGES,
        }
    }
}

/// Context for a transition
///
/// `agents` tracks the latest applied configuration; `now` is refreshed by
/// the runtime before every transition.
#[derive(Debug, Clone)]
pub struct EngineContext {
    pub session_id: String,
    pub settings: EngineSettings,
    pub agents: AgentPair,
    pub now: DateTime<Utc>,
}

impl EngineContext {
    pub fn new(session_id: impl Into<String>, settings: EngineSettings, agents: AgentPair) -> Self {
        Self {
            session_id: session_id.into(),
            settings,
            agents,
            now: Utc::now(),
        }
    }
}
