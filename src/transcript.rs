//! Conversation transcript: messages, the per-session store, and context building

mod context;
pub(crate) mod message;
mod store;

pub use context::{build_context, ContextEntry, ContextRole};
pub use message::{Message, MessageDraft, MessageMetadata, UsageData};
pub use store::{AgentFlags, ConversationState, Lifecycle};
