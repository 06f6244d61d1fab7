//! Conversation runtime executor
//!
//! One executor per session. It is the only writer of the session's
//! transcript: every input arrives on the inbox, goes through the pure
//! transition, and the resulting effects are interpreted here.

use super::traits::{AudioPlayer, CompletionClient, SpeechSynthesizer};
use super::{EngineView, Envelope, SseEvent};

use crate::agent::{AgentSlot, Voice};
use crate::llm::LlmRequest;
use crate::narration::NarrationError;
use crate::state_machine::{
    transition, Effect, EngineContext, EngineState, Event, NarrationOutcome, TransitionError,
};
use crate::transcript::{build_context, ConversationState, UsageData};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc, watch, RwLock};
use tokio_util::sync::CancellationToken;

/// Generic conversation runtime that can work with any completion, speech
/// and playback implementations
pub struct ConversationRuntime<C, S, P>
where
    C: CompletionClient + 'static,
    S: SpeechSynthesizer + 'static,
    P: AudioPlayer + 'static,
{
    context: EngineContext,
    state: EngineState,
    transcript: Arc<RwLock<ConversationState>>,
    completions: Arc<C>,
    speech: Arc<S>,
    player: Arc<P>,
    event_rx: mpsc::Receiver<Envelope>,
    event_tx: mpsc::Sender<Envelope>,
    broadcast_tx: broadcast::Sender<SseEvent>,
    view_tx: watch::Sender<EngineView>,
    /// Token for the armed turn timer
    timer_cancel_token: Option<CancellationToken>,
    /// Token for the in-flight completion request
    generation_cancel_token: Option<CancellationToken>,
    /// Token for the in-flight synthesis and playback
    narration_cancel_token: Option<CancellationToken>,
}

impl<C, S, P> ConversationRuntime<C, S, P>
where
    C: CompletionClient + 'static,
    S: SpeechSynthesizer + 'static,
    P: AudioPlayer + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        context: EngineContext,
        transcript: Arc<RwLock<ConversationState>>,
        completions: C,
        speech: S,
        player: Arc<P>,
        event_rx: mpsc::Receiver<Envelope>,
        event_tx: mpsc::Sender<Envelope>,
        broadcast_tx: broadcast::Sender<SseEvent>,
        view_tx: watch::Sender<EngineView>,
    ) -> Self {
        Self {
            context,
            state: EngineState::Idle,
            transcript,
            completions: Arc::new(completions),
            speech: Arc::new(speech),
            player,
            event_rx,
            event_tx,
            broadcast_tx,
            view_tx,
            timer_cancel_token: None,
            generation_cancel_token: None,
            narration_cancel_token: None,
        }
    }

    /// Process inbox events until the session is torn down
    pub async fn run(mut self) {
        tracing::info!(session_id = %self.context.session_id, "Starting conversation runtime");

        while let Some(Envelope { event, reply }) = self.event_rx.recv().await {
            let teardown = matches!(event, Event::Teardown);
            let result = self.process_event(event).await;

            if let Err(e) = &result {
                tracing::debug!(
                    session_id = %self.context.session_id,
                    state = self.state.name(),
                    error = %e,
                    "Event rejected"
                );
            }
            if let Some(reply) = reply {
                let _ = reply.send(result);
            }
            if teardown {
                break;
            }
        }

        tracing::info!(session_id = %self.context.session_id, "Conversation runtime stopped");
    }

    async fn process_event(&mut self, event: Event) -> Result<(), TransitionError> {
        self.context.now = Utc::now();
        let result = transition(&self.state, &self.context, event)?;

        let old_state = std::mem::replace(&mut self.state, result.new_state);
        if old_state != self.state {
            tracing::debug!(
                session_id = %self.context.session_id,
                from = old_state.name(),
                to = self.state.name(),
                turns = self.state.turns(),
                "State transition"
            );
        }

        for effect in result.effects {
            self.execute_effect(effect).await;
        }

        if old_state != self.state {
            self.publish_state().await;
        }
        Ok(())
    }

    /// Sync the transcript lifecycle with the engine and notify clients
    async fn publish_state(&mut self) {
        let lifecycle = self.state.lifecycle();
        let error = {
            let mut transcript = self.transcript.write().await;
            transcript.set_lifecycle(lifecycle);
            transcript.error().map(ToString::to_string)
        };

        let engine = EngineView {
            state: self.state.clone(),
            agents: self.context.agents.clone(),
        };
        self.view_tx.send_replace(engine.clone());
        let _ = self.broadcast_tx.send(SseEvent::StateChange {
            engine,
            lifecycle,
            error,
        });
    }

    async fn broadcast_presence(&self) {
        let transcript = self.transcript.read().await;
        let _ = self.broadcast_tx.send(SseEvent::Presence {
            typing: transcript.typing(),
            speaking: transcript.speaking(),
            current_speaker: transcript.current_speaker(),
        });
    }

    #[allow(clippy::too_many_lines)]
    async fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::AppendMessage { draft } => {
                let appended = self.transcript.write().await.append(draft);
                match appended {
                    Ok(message) => {
                        let _ = self.broadcast_tx.send(SseEvent::Message { message });
                    }
                    Err(e) => {
                        tracing::warn!(
                            session_id = %self.context.session_id,
                            error = %e,
                            "Rejected malformed message"
                        );
                    }
                }
            }

            Effect::SetTyping { agent, on } => {
                self.transcript.write().await.set_typing(agent, on);
                self.broadcast_presence().await;
            }

            Effect::SetSpeaking { agent, on } => {
                self.transcript.write().await.set_speaking(agent, on);
                self.broadcast_presence().await;
            }

            Effect::ClearPresence => {
                self.transcript.write().await.clear_presence();
                self.broadcast_presence().await;
            }

            Effect::SetError { message } => {
                self.transcript.write().await.set_error(message.clone());
                if let Some(message) = message {
                    let _ = self.broadcast_tx.send(SseEvent::Error { message });
                }
            }

            Effect::ClearTranscript => {
                self.transcript.write().await.clear();
                self.player.reset();
                let _ = self.broadcast_tx.send(SseEvent::Cleared);
            }

            Effect::MarkNarrated => {
                self.transcript.write().await.mark_narrated();
            }

            Effect::ApplyAgentConfig { slot, config } => {
                if let Err(e) = self.context.agents.set(slot, config) {
                    tracing::warn!(agent = %slot, error = %e, "Agent config rejected");
                    return;
                }
                tracing::info!(
                    session_id = %self.context.session_id,
                    agent = %slot,
                    model = %self.context.agents.get(slot).model,
                    "Agent config updated"
                );
                self.publish_state().await;
            }

            Effect::RequestGeneration { agent, turn } => {
                let config = self.context.agents.get(agent).clone();
                let request = {
                    let transcript = self.transcript.read().await;
                    let context = build_context(transcript.messages(), agent);
                    LlmRequest::for_turn(&config, &context)
                };
                // Voice is fixed now so later config edits only affect later turns
                let narration = config.narration.voice_if_enabled();
                self.spawn_generation(agent, turn, request, narration);
            }

            Effect::RequestNarration {
                agent,
                message_id,
                text,
                voice,
            } => {
                self.spawn_narration(agent, message_id, text, voice);
            }

            Effect::ScheduleTurn { agent, turn, delay } => {
                self.spawn_timer(agent, turn, delay);
            }

            Effect::CancelTimer => {
                if let Some(token) = self.timer_cancel_token.take() {
                    token.cancel();
                }
            }

            Effect::AbortGeneration => {
                if let Some(token) = self.generation_cancel_token.take() {
                    tracing::debug!(session_id = %self.context.session_id, "Aborting generation");
                    token.cancel();
                }
            }

            Effect::AbortNarration => {
                if let Some(token) = self.narration_cancel_token.take() {
                    tracing::debug!(session_id = %self.context.session_id, "Aborting narration");
                    token.cancel();
                }
            }
        }
    }

    fn spawn_timer(&mut self, agent: AgentSlot, turn: u32, delay: Duration) {
        let cancel_token = CancellationToken::new();
        if let Some(previous) = self.timer_cancel_token.replace(cancel_token.clone()) {
            previous.cancel();
        }

        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = cancel_token.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    let _ = event_tx.send(Envelope::internal(Event::TurnDue { agent, turn })).await;
                }
            }
        });
    }

    fn spawn_generation(
        &mut self,
        agent: AgentSlot,
        turn: u32,
        request: LlmRequest,
        narration: Option<Voice>,
    ) {
        let cancel_token = CancellationToken::new();
        if let Some(previous) = self.generation_cancel_token.replace(cancel_token.clone()) {
            previous.cancel();
        }

        let completions = self.completions.clone();
        let event_tx = self.event_tx.clone();
        let session_id = self.context.session_id.clone();

        tokio::spawn(async move {
            tracing::info!(
                session_id = %session_id,
                agent = %agent,
                turn,
                model = %request.model,
                context_len = request.messages.len(),
                "Requesting completion"
            );
            let started = Instant::now();

            let result = tokio::select! {
                biased;
                () = cancel_token.cancelled() => {
                    tracing::info!(session_id = %session_id, agent = %agent, "Completion cancelled");
                    return;
                }
                result = completions.complete(&request) => result,
            };
            // A stop that landed while the response was in flight wins
            if cancel_token.is_cancelled() {
                return;
            }

            let event = match result {
                Ok(response) => Event::GenerationComplete {
                    agent,
                    turn,
                    message_id: uuid::Uuid::new_v4().to_string(),
                    text: response.text,
                    model: request.model,
                    usage: (!response.usage.is_zero()).then(|| UsageData::from(response.usage)),
                    processing_ms: u64::try_from(started.elapsed().as_millis())
                        .unwrap_or(u64::MAX),
                    narration,
                },
                Err(e) => {
                    tracing::warn!(
                        session_id = %session_id,
                        agent = %agent,
                        error = %e,
                        kind = ?e.kind,
                        "Completion failed"
                    );
                    Event::GenerationFailed {
                        agent,
                        turn,
                        message: e.message,
                        error_kind: e.kind,
                    }
                }
            };
            let _ = event_tx.send(Envelope::internal(event)).await;
        });
    }

    fn spawn_narration(&mut self, agent: AgentSlot, message_id: String, text: String, voice: Voice) {
        let cancel_token = CancellationToken::new();
        if let Some(previous) = self.narration_cancel_token.replace(cancel_token.clone()) {
            previous.cancel();
        }

        let speech = self.speech.clone();
        let player = self.player.clone();
        let event_tx = self.event_tx.clone();
        let session_id = self.context.session_id.clone();

        tokio::spawn(async move {
            let narrate = async {
                let audio = speech.synthesize(&text, voice).await?;
                player.play(&message_id, audio, cancel_token.clone()).await?;
                Ok::<(), NarrationError>(())
            };

            let result = tokio::select! {
                biased;
                () = cancel_token.cancelled() => return,
                result = narrate => result,
            };
            if cancel_token.is_cancelled() {
                return;
            }

            let outcome = match result {
                Ok(()) => NarrationOutcome::Played,
                Err(e) => {
                    tracing::warn!(
                        session_id = %session_id,
                        agent = %agent,
                        message_id = %message_id,
                        error = %e,
                        "Narration failed; continuing without audio"
                    );
                    NarrationOutcome::Failed {
                        message: e.to_string(),
                    }
                }
            };
            let _ = event_tx
                .send(Envelope::internal(Event::NarrationFinished {
                    agent,
                    message_id,
                    outcome,
                }))
                .await;
        });
    }
}
