//! API request and response types

use crate::agent::{AgentPair, Direction, Voice};
use crate::llm::ModelInfo;
use crate::runtime::EngineView;
use crate::transcript::ConversationState;
use serde::{Deserialize, Serialize};

/// Response for a newly mounted session
#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub agents: AgentPair,
}

/// Full snapshot of one session
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub conversation: ConversationState,
    pub engine: EngineView,
}

/// Request to start a conversation
#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub direction: Direction,
    pub seed: String,
}

/// Request to insert a human message
#[derive(Debug, Deserialize)]
pub struct HumanMessageRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct MessageAcceptedResponse {
    pub id: String,
}

/// Generic success response
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

#[derive(Debug, Serialize)]
pub struct PlaybackAckResponse {
    pub acknowledged: bool,
}

/// Response with available models
#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelInfo>,
    pub default: String,
}

#[derive(Debug, Serialize)]
pub struct VoicesResponse {
    pub voices: Vec<Voice>,
    /// False when no speech provider is configured
    pub narration_available: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
