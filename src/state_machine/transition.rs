//! Pure state transition function
//!
//! Given the same state, context and event this always produces the same
//! result. Timers, completion calls and playback only happen when the
//! runtime interprets the returned effects.

use super::state::StopReason;
use super::{EngineContext, EngineState, Effect, Event, NarrationOutcome};
use crate::agent::{AgentConfigError, AgentSlot, Direction};
use crate::llm::LlmErrorKind;
use crate::transcript::{MessageDraft, MessageMetadata};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: EngineState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: EngineState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    #[must_use]
    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Rejected input; nothing was mutated
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Seed message must not be empty")]
    EmptySeed,
    #[error("No model configured for {0}")]
    MissingModel(AgentSlot),
    #[error("Direction {0:?} is not supported by the turn engine")]
    UnsupportedDirection(Direction),
    #[error("Message must not be empty")]
    EmptyMessage,
    #[error(transparent)]
    AgentConfig(#[from] AgentConfigError),
}

/// Errors that can occur during transition
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransitionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Conversation is already active (stop it first)")]
    AlreadyActive,
}

pub fn transition(
    state: &EngineState,
    ctx: &EngineContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // Commands accepted in every state
        // ============================================================
        (_, Event::HumanMessage { id, text }) => {
            let text = text.trim();
            if text.is_empty() {
                return Err(ValidationError::EmptyMessage.into());
            }
            Ok(TransitionResult::new(state.clone()).with_effect(Effect::AppendMessage {
                draft: MessageDraft::human(text).with_id(id),
            }))
        }

        (_, Event::UpdateAgent { slot, config }) => {
            let config = config.validated().map_err(ValidationError::from)?;
            Ok(TransitionResult::new(state.clone())
                .with_effect(Effect::ApplyAgentConfig { slot, config }))
        }

        (_, Event::Clear) => Ok(TransitionResult::new(EngineState::Idle)
            .with_effects(Effect::abort_all())
            .with_effect(Effect::ClearTranscript)),

        (_, Event::Teardown) => Ok(TransitionResult::new(EngineState::Stopped {
            reason: StopReason::Teardown,
            turns: state.turns(),
        })
        .with_effects(Effect::abort_all())
        .with_effect(Effect::ClearTranscript)),

        (
            _,
            Event::Start {
                direction,
                seed,
                seed_id,
            },
        ) => {
            if state.is_active() {
                return Err(TransitionError::AlreadyActive);
            }
            start(ctx, direction, &seed, seed_id)
        }

        // ============================================================
        // Stop (idempotent once inactive)
        // ============================================================
        (EngineState::Idle | EngineState::Stopped { .. }, Event::Stop) => {
            Ok(TransitionResult::new(state.clone()))
        }

        (
            EngineState::Scheduled { turn, .. }
            | EngineState::AwaitingGeneration { turn, .. }
            | EngineState::AwaitingNarration { turn, .. },
            Event::Stop,
        ) => Ok(TransitionResult::new(EngineState::Stopped {
            reason: StopReason::UserStopped,
            turns: *turn,
        })
        .with_effects(Effect::abort_all())
        .with_effect(Effect::ClearPresence)),

        // ============================================================
        // Turn execution
        // ============================================================
        (EngineState::Scheduled { agent, turn, .. }, Event::TurnDue { agent: a, turn: t })
            if *agent == a && *turn == t =>
        {
            Ok(
                TransitionResult::new(EngineState::AwaitingGeneration { agent: a, turn: t })
                    .with_effect(Effect::typing(a, true))
                    .with_effect(Effect::RequestGeneration { agent: a, turn: t }),
            )
        }

        (
            EngineState::AwaitingGeneration { agent, turn },
            Event::GenerationComplete {
                agent: a,
                turn: t,
                message_id,
                text,
                model,
                usage,
                processing_ms,
                narration,
            },
        ) if *agent == a && *turn == t => {
            let text = text.trim();
            if text.is_empty() {
                return Ok(generation_failed(
                    a,
                    *turn,
                    "Completion service returned an empty response".to_string(),
                    LlmErrorKind::Unknown,
                ));
            }

            let draft = MessageDraft::assistant(a, text)
                .with_id(message_id.clone())
                .with_model(model)
                .with_metadata(MessageMetadata {
                    processing_ms: Some(processing_ms),
                    usage,
                });
            let effects = vec![Effect::typing(a, false), Effect::AppendMessage { draft }];
            let turn = turn + 1;

            match narration {
                Some(voice) => Ok(TransitionResult::new(EngineState::AwaitingNarration {
                    agent: a,
                    turn,
                    message_id: message_id.clone(),
                })
                .with_effects(effects)
                .with_effect(Effect::speaking(a, true))
                .with_effect(Effect::RequestNarration {
                    agent: a,
                    message_id,
                    text: text.to_string(),
                    voice,
                })),
                None => Ok(schedule_next(ctx, a, turn, effects)),
            }
        }

        (
            EngineState::AwaitingGeneration { agent, turn },
            Event::GenerationFailed {
                agent: a,
                turn: t,
                message,
                error_kind,
            },
        ) if *agent == a && *turn == t => Ok(generation_failed(a, *turn, message, error_kind)),

        (
            EngineState::AwaitingNarration {
                agent,
                turn,
                message_id,
            },
            Event::NarrationFinished {
                agent: a,
                message_id: m,
                outcome,
            },
        ) if *agent == a && *message_id == m => {
            let mut effects = vec![Effect::speaking(a, false)];
            if outcome == NarrationOutcome::Played {
                effects.push(Effect::MarkNarrated);
            }
            Ok(schedule_next(ctx, a, *turn, effects))
        }

        // Stale timer firings and results that lost a race with stop/clear
        (_, _) => Ok(TransitionResult::new(state.clone())),
    }
}

fn start(
    ctx: &EngineContext,
    direction: Direction,
    seed: &str,
    seed_id: String,
) -> Result<TransitionResult, TransitionError> {
    let starter = direction
        .starter()
        .ok_or(ValidationError::UnsupportedDirection(direction))?;
    let seed = seed.trim();
    if seed.is_empty() {
        return Err(ValidationError::EmptySeed.into());
    }
    if let Some(slot) = ctx.agents.missing_model() {
        return Err(ValidationError::MissingModel(slot).into());
    }

    let mut effects: Vec<Effect> = Effect::abort_all().into();
    effects.extend([
        Effect::ClearTranscript,
        Effect::AppendMessage {
            draft: MessageDraft::assistant(starter, seed).with_id(seed_id),
        },
    ]);

    // The seed is turn 1
    Ok(schedule_next(ctx, starter, 1, effects))
}

/// Stop at the turn budget, otherwise hand the floor to the other agent
fn schedule_next(
    ctx: &EngineContext,
    agent: AgentSlot,
    turn: u32,
    effects: Vec<Effect>,
) -> TransitionResult {
    if turn >= ctx.settings.max_turns {
        return TransitionResult::new(EngineState::Stopped {
            reason: StopReason::TurnLimitReached,
            turns: turn,
        })
        .with_effects(effects);
    }

    let next = agent.other();
    let delay = ctx.settings.turn_delay;
    let fire_at = ctx.now + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());

    TransitionResult::new(EngineState::Scheduled {
        agent: next,
        turn,
        fire_at,
    })
    .with_effects(effects)
    .with_effect(Effect::ScheduleTurn {
        agent: next,
        turn,
        delay,
    })
}

fn generation_failed(
    agent: AgentSlot,
    turn: u32,
    message: String,
    error_kind: LlmErrorKind,
) -> TransitionResult {
    TransitionResult::new(EngineState::Stopped {
        reason: StopReason::GenerationFailed {
            message: message.clone(),
            error_kind,
        },
        turns: turn,
    })
    .with_effect(Effect::typing(agent, false))
    .with_effect(Effect::error(message))
}
