//! Property-based tests for the turn engine
//!
//! A small simulator applies transition effects to a real transcript store
//! so the properties can be stated over the resulting log.

use super::state::StopReason;
use super::transition::{transition, TransitionError};
use super::*;
use crate::agent::{AgentPair, AgentSlot, Direction, Voice};
use crate::llm::LlmErrorKind;
use crate::transcript::message::Role;
use crate::transcript::{build_context, ContextRole, ConversationState, Message};
use chrono::Utc;
use proptest::prelude::*;
use std::time::Duration;

// ============================================================================
// Simulator
// ============================================================================

struct Sim {
    state: EngineState,
    ctx: EngineContext,
    store: ConversationState,
    next_id: u32,
}

impl Sim {
    fn new(max_turns: u32) -> Self {
        let settings = EngineSettings {
            turn_delay: Duration::from_millis(3000),
            max_turns,
            max_messages: 1000,
        };
        Self {
            state: EngineState::Idle,
            ctx: EngineContext::new("sim", settings, AgentPair::with_default_model("test-model")),
            store: ConversationState::new(settings.max_messages),
            next_id: 0,
        }
    }

    fn apply(&mut self, event: Event) -> Result<Vec<Effect>, TransitionError> {
        let result = transition(&self.state, &self.ctx, event)?;
        for effect in &result.effects {
            match effect {
                Effect::AppendMessage { draft } => {
                    self.store.append(draft.clone()).unwrap();
                }
                Effect::SetTyping { agent, on } => self.store.set_typing(*agent, *on),
                Effect::SetSpeaking { agent, on } => self.store.set_speaking(*agent, *on),
                Effect::ClearPresence => self.store.clear_presence(),
                Effect::SetError { message } => self.store.set_error(message.clone()),
                Effect::ClearTranscript => self.store.clear(),
                Effect::MarkNarrated => self.store.mark_narrated(),
                Effect::ApplyAgentConfig { slot, config } => {
                    self.ctx.agents.set(*slot, config.clone()).unwrap();
                }
                Effect::RequestGeneration { .. }
                | Effect::RequestNarration { .. }
                | Effect::ScheduleTurn { .. }
                | Effect::CancelTimer
                | Effect::AbortGeneration
                | Effect::AbortNarration => {}
            }
        }
        self.state = result.new_state;
        Ok(result.effects)
    }

    fn fresh_id(&mut self) -> String {
        self.next_id += 1;
        format!("m{}", self.next_id)
    }

    /// Resolve whatever the engine is waiting on with a successful outcome.
    /// Returns false once nothing is pending.
    fn step(&mut self, narration: Option<Voice>) -> bool {
        let event = match self.state.clone() {
            EngineState::Scheduled { agent, turn, .. } => Event::TurnDue { agent, turn },
            EngineState::AwaitingGeneration { agent, turn } => Event::GenerationComplete {
                agent,
                turn,
                message_id: self.fresh_id(),
                text: format!("reply from {agent}"),
                model: "test-model".to_string(),
                usage: None,
                processing_ms: 5,
                narration,
            },
            EngineState::AwaitingNarration {
                agent, message_id, ..
            } => Event::NarrationFinished {
                agent,
                message_id,
                outcome: NarrationOutcome::Played,
            },
            EngineState::Idle | EngineState::Stopped { .. } => return false,
        };
        self.apply(event).unwrap();
        true
    }

    fn run_to_completion(&mut self, narration: Option<Voice>) {
        // Every turn takes at most three steps
        let bound = self.ctx.settings.max_turns * 3 + 3;
        for _ in 0..bound {
            if !self.step(narration) {
                return;
            }
        }
        panic!("conversation did not terminate");
    }
}

fn start(direction: Direction, seed: &str) -> Event {
    Event::Start {
        direction,
        seed: seed.to_string(),
        seed_id: "seed".to_string(),
    }
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_agent() -> impl Strategy<Value = AgentSlot> {
    prop_oneof![Just(AgentSlot::AgentA), Just(AgentSlot::AgentB)]
}

fn arb_direction() -> impl Strategy<Value = Direction> {
    prop_oneof![Just(Direction::AgentAOpens), Just(Direction::AgentBOpens)]
}

fn arb_voice() -> impl Strategy<Value = Option<Voice>> {
    proptest::option::of(proptest::sample::select(Voice::ALL.to_vec()))
}

fn arb_error_kind() -> impl Strategy<Value = LlmErrorKind> {
    prop_oneof![
        Just(LlmErrorKind::Network),
        Just(LlmErrorKind::RateLimit),
        Just(LlmErrorKind::ServerError),
        Just(LlmErrorKind::Auth),
        Just(LlmErrorKind::Unknown),
    ]
}

fn arb_active_state() -> impl Strategy<Value = EngineState> {
    prop_oneof![
        (arb_agent(), 1u32..10).prop_map(|(agent, turn)| EngineState::Scheduled {
            agent,
            turn,
            fire_at: Utc::now(),
        }),
        (arb_agent(), 1u32..10).prop_map(|(agent, turn)| EngineState::AwaitingGeneration { agent, turn }),
        (arb_agent(), 2u32..10, "m[0-9]").prop_map(|(agent, turn, message_id)| {
            EngineState::AwaitingNarration {
                agent,
                turn,
                message_id,
            }
        }),
    ]
}

fn arb_state() -> impl Strategy<Value = EngineState> {
    prop_oneof![
        Just(EngineState::Idle),
        Just(EngineState::Stopped {
            reason: StopReason::UserStopped,
            turns: 2
        }),
        Just(EngineState::Stopped {
            reason: StopReason::TurnLimitReached,
            turns: 10
        }),
        arb_active_state(),
    ]
}

/// Results that spawned I/O could deliver at any moment
fn arb_io_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        (arb_agent(), 0u32..10).prop_map(|(agent, turn)| Event::TurnDue { agent, turn }),
        (arb_agent(), 0u32..10, "m[0-9]", arb_voice()).prop_map(
            |(agent, turn, message_id, narration)| Event::GenerationComplete {
                agent,
                turn,
                message_id,
                text: "late reply".to_string(),
                model: "test-model".to_string(),
                usage: None,
                processing_ms: 1,
                narration,
            },
        ),
        (arb_agent(), 0u32..10, arb_error_kind()).prop_map(|(agent, turn, error_kind)| {
            Event::GenerationFailed {
                agent,
                turn,
                message: "failed".to_string(),
                error_kind,
            }
        }),
        (arb_agent(), "m[0-9]").prop_map(|(agent, message_id)| Event::NarrationFinished {
            agent,
            message_id,
            outcome: NarrationOutcome::Played,
        }),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        (arb_direction(), "[a-zA-Z ]{0,12}").prop_map(|(d, seed)| start(d, &seed)),
        Just(Event::Stop),
        Just(Event::Clear),
        "[a-z ]{0,8}".prop_map(|text| Event::HumanMessage {
            id: "h".to_string(),
            text,
        }),
        arb_io_event(),
    ]
}

fn arb_message() -> impl Strategy<Value = Message> {
    (
        prop_oneof![
            3 => Just(Role::Assistant),
            1 => Just(Role::Human),
            1 => Just(Role::System),
        ],
        proptest::option::of(arb_agent()),
        "[a-z]{1,10}",
    )
        .prop_map(|(role, agent, content)| Message {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content,
            timestamp: Utc::now(),
            agent,
            model: None,
            metadata: None,
        })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// The seed is the first log entry and is attributed to the starter
    #[test]
    fn prop_seed_attributed_to_starter(
        direction in arb_direction(),
        seed in "[a-zA-Z][a-zA-Z ]{0,20}",
        max_turns in 1u32..8,
    ) {
        let mut sim = Sim::new(max_turns);
        sim.apply(start(direction, &seed)).unwrap();

        let first = &sim.store.messages()[0];
        prop_assert_eq!(first.role, Role::Assistant);
        prop_assert_eq!(first.agent, direction.starter());
        prop_assert_eq!(first.content.as_str(), seed.trim());
    }

    /// Running to the budget stops without error with turns == max_turns,
    /// alternating speakers
    #[test]
    fn prop_run_to_budget(
        direction in arb_direction(),
        max_turns in 1u32..12,
        narration in arb_voice(),
    ) {
        let mut sim = Sim::new(max_turns);
        sim.apply(start(direction, "Hello!")).unwrap();
        sim.run_to_completion(narration);

        prop_assert_eq!(
            &sim.state,
            &EngineState::Stopped { reason: StopReason::TurnLimitReached, turns: max_turns }
        );
        prop_assert_eq!(sim.store.error(), None);

        let log = sim.store.messages();
        prop_assert_eq!(log.len(), max_turns as usize);
        for pair in log.windows(2) {
            prop_assert_eq!(pair[1].agent, pair[0].agent.map(AgentSlot::other));
        }
        prop_assert_eq!(sim.store.has_audio(), narration.is_some() && max_turns > 1);
    }

    /// Stopping twice is the same as stopping once
    #[test]
    fn prop_stop_idempotent(state in arb_state()) {
        let ctx = Sim::new(10).ctx;
        let once = transition(&state, &ctx, Event::Stop).unwrap();
        let twice = transition(&once.new_state, &ctx, Event::Stop).unwrap();
        prop_assert_eq!(&once.new_state, &twice.new_state);
        prop_assert!(twice.effects.is_empty());
        prop_assert!(!once.new_state.is_active());
    }

    /// Nothing a stale or late result delivers is appended after a stop
    #[test]
    fn prop_no_append_after_stop(
        state in arb_active_state(),
        late in prop::collection::vec(arb_io_event(), 1..6),
    ) {
        let ctx = Sim::new(10).ctx;
        let mut current = transition(&state, &ctx, Event::Stop).unwrap().new_state;
        for event in late {
            let result = transition(&current, &ctx, event).unwrap();
            prop_assert!(result.effects.is_empty());
            prop_assert_eq!(&result.new_state, &current);
            current = result.new_state;
        }
    }

    /// Under any event sequence: assistant messages always carry an agent,
    /// at most one agent is typing or speaking, and inactive states hold no
    /// presence flags
    #[test]
    fn prop_invariants_under_random_events(
        max_turns in 1u32..6,
        events in prop::collection::vec(arb_event(), 1..40),
    ) {
        let mut sim = Sim::new(max_turns);
        for event in events {
            let _ = sim.apply(event);

            for m in sim.store.messages() {
                if m.role == Role::Assistant {
                    prop_assert!(m.agent.is_some());
                }
            }
            let typing = sim.store.typing();
            let speaking = sim.store.speaking();
            prop_assert!(!(typing.agent_a && typing.agent_b));
            prop_assert!(!(speaking.agent_a && speaking.agent_b));
            if !sim.state.is_active() {
                prop_assert!(!typing.any() && !speaking.any());
            }
        }
    }

    /// Every assistant message with an agent is `assistant` in its author's
    /// context and `user` in the other agent's
    #[test]
    fn prop_context_symmetry(log in prop::collection::vec(arb_message(), 0..20)) {
        let a = build_context(&log, AgentSlot::AgentA);
        let b = build_context(&log, AgentSlot::AgentB);
        prop_assert_eq!(a.len(), b.len());

        let dialogue: Vec<&Message> = log
            .iter()
            .filter(|m| m.role == Role::Assistant && m.agent.is_some())
            .collect();
        prop_assert_eq!(dialogue.len(), a.len());

        for ((msg, ea), eb) in dialogue.iter().zip(&a).zip(&b) {
            prop_assert_ne!(ea.role, eb.role);
            prop_assert_eq!(&ea.content, &msg.content);
            prop_assert_eq!(&eb.content, &msg.content);
            let expected_a = if msg.agent == Some(AgentSlot::AgentA) {
                ContextRole::Assistant
            } else {
                ContextRole::User
            };
            prop_assert_eq!(ea.role, expected_a);
        }
    }

    /// A generation failure on any turn keeps the log intact and stops with an error
    #[test]
    fn prop_failure_is_fail_stop(
        direction in arb_direction(),
        fail_after in 0u32..4,
        error_kind in arb_error_kind(),
    ) {
        let mut sim = Sim::new(10);
        sim.apply(start(direction, "Hello!")).unwrap();

        // Complete `fail_after` turns, then fail the next one
        let mut completed = 0;
        while completed < fail_after {
            let before = sim.store.messages().len();
            sim.step(None);
            if sim.store.messages().len() > before {
                completed += 1;
            }
        }
        // Fire the timer
        sim.step(None);
        let EngineState::AwaitingGeneration { agent, turn } = sim.state.clone() else {
            panic!("expected generation in flight");
        };
        let len_before = sim.store.messages().len();
        sim.apply(Event::GenerationFailed {
            agent,
            turn,
            message: "boom".to_string(),
            error_kind,
        })
        .unwrap();

        prop_assert_eq!(sim.store.messages().len(), len_before);
        prop_assert_eq!(sim.store.error(), Some("boom"));
        prop_assert!(!sim.store.typing().any());
        let is_failed = matches!(
            sim.state,
            EngineState::Stopped { reason: StopReason::GenerationFailed { .. }, .. }
        );
        prop_assert!(is_failed);
    }
}
