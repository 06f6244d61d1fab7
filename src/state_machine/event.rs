//! Events that can occur in a conversation

use crate::agent::{AgentConfig, AgentSlot, Direction, Voice};
use crate::llm::LlmErrorKind;
use crate::transcript::UsageData;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // Client commands
    Start {
        direction: Direction,
        seed: String,
        /// Id assigned to the seed message
        seed_id: String,
    },
    Stop,
    Clear,
    HumanMessage {
        id: String,
        text: String,
    },
    UpdateAgent {
        slot: AgentSlot,
        config: AgentConfig,
    },
    /// The hosting surface went away
    Teardown,

    // Timer events
    TurnDue {
        agent: AgentSlot,
        turn: u32,
    },

    // Completion events
    GenerationComplete {
        agent: AgentSlot,
        /// Turn counter the request was issued for
        turn: u32,
        message_id: String,
        text: String,
        model: String,
        usage: Option<UsageData>,
        processing_ms: u64,
        /// Narration voice captured from the config the turn ran with
        narration: Option<Voice>,
    },
    GenerationFailed {
        agent: AgentSlot,
        turn: u32,
        message: String,
        error_kind: LlmErrorKind,
    },

    // Narration events
    NarrationFinished {
        agent: AgentSlot,
        message_id: String,
        outcome: NarrationOutcome,
    },
}

/// How a narration attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NarrationOutcome {
    Played,
    Failed { message: String },
}
