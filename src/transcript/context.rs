//! Per-agent context building
//!
//! Reframes the shared transcript as a two-party dialogue from one agent's
//! point of view: its own turns become `assistant`, the other agent's turns
//! become `user`. Entries carry no name field so the model never conditions
//! on agent identities.

use super::message::{Message, Role};
use crate::agent::AgentSlot;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextRole {
    Assistant,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextEntry {
    pub role: ContextRole,
    pub content: String,
}

/// Build the dialogue history for `for_agent`
///
/// System and human messages are not part of the two-party dialogue and are
/// skipped, as are assistant messages without an agent tag.
pub fn build_context(messages: &[Message], for_agent: AgentSlot) -> Vec<ContextEntry> {
    messages
        .iter()
        .filter(|m| m.role == Role::Assistant && m.agent.is_some())
        .map(|m| {
            let role = if m.is_from(for_agent) {
                ContextRole::Assistant
            } else {
                ContextRole::User
            };
            ContextEntry {
                role,
                content: m.content.clone(),
            }
        })
        .collect()
}
