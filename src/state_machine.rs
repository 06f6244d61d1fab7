//! Conversation turn engine
//!
//! Implements the Elm Architecture pattern with pure state transitions. The
//! runtime owns the state, feeds events in, and executes the effects.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::{Event, NarrationOutcome};
pub use state::{EngineContext, EngineSettings, EngineState};
pub use transition::{transition, TransitionError};
