//! Database schema and types

use crate::agent::AgentPair;
use crate::transcript::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS shared_conversations (
    id TEXT PRIMARY KEY,
    messages TEXT NOT NULL,
    agents TEXT NOT NULL,
    has_audio BOOLEAN NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    shared_at TEXT NOT NULL,
    expires_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_shared_expires ON shared_conversations(expires_at);
";

/// A read-only, expiring copy of a transcript and the agents that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedConversation {
    pub id: String,
    pub messages: Vec<Message>,
    pub agents: AgentPair,
    /// Timestamp of the first message
    pub created_at: DateTime<Utc>,
    pub shared_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub has_audio: bool,
}

impl SharedConversation {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
