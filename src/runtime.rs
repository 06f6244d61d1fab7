//! Runtime for executing conversations
//!
//! Each session gets its own actor task (`ConversationRuntime`). The
//! `RuntimeManager` creates and tears them down and routes commands to them.

mod executor;
pub mod traits;


pub use executor::ConversationRuntime;
pub use traits::*;

use crate::agent::{AgentPair, AgentSlot};
use crate::llm::ModelRegistry;
use crate::narration::{ClientPlayback, SpeechService};
use crate::state_machine::{EngineContext, EngineSettings, EngineState, Event, TransitionError};
use crate::transcript::{AgentFlags, ConversationState, Lifecycle, Message};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch, RwLock};
use tokio::time::Instant;

/// Type alias for production runtime with concrete implementations
pub type ProductionRuntime =
    ConversationRuntime<Arc<RegistryCompletionClient>, Arc<ServiceSynthesizer>, ClientPlayback>;

const INBOX_CAPACITY: usize = 32;
const BROADCAST_CAPACITY: usize = 128;

/// An inbox entry; client commands carry a reply channel for validation errors
#[derive(Debug)]
pub struct Envelope {
    pub event: Event,
    pub reply: Option<oneshot::Sender<Result<(), TransitionError>>>,
}

impl Envelope {
    pub fn command(event: Event) -> (Self, oneshot::Receiver<Result<(), TransitionError>>) {
        let (reply_tx, reply_rx) = oneshot::channel();
        (
            Self {
                event,
                reply: Some(reply_tx),
            },
            reply_rx,
        )
    }

    /// Result of spawned I/O; nobody waits on it
    pub fn internal(event: Event) -> Self {
        Self { event, reply: None }
    }
}

/// Engine state plus the agent configs it runs with
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineView {
    pub state: EngineState,
    pub agents: AgentPair,
}

/// Events sent to SSE clients
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SseEvent {
    Init {
        conversation: ConversationState,
        engine: EngineView,
    },
    Message {
        message: Message,
    },
    StateChange {
        engine: EngineView,
        lifecycle: Lifecycle,
        error: Option<String>,
    },
    Presence {
        typing: AgentFlags,
        speaking: AgentFlags,
        current_speaker: Option<AgentSlot>,
    },
    /// A clip is ready; the client plays it and acknowledges when done
    Narration {
        message_id: String,
        mime_type: String,
        url: String,
    },
    Cleared,
    Error {
        message: String,
    },
}

impl SseEvent {
    /// SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            SseEvent::Init { .. } => "init",
            SseEvent::Message { .. } => "message",
            SseEvent::StateChange { .. } => "state_change",
            SseEvent::Presence { .. } => "presence",
            SseEvent::Narration { .. } => "narration",
            SseEvent::Cleared => "cleared",
            SseEvent::Error { .. } => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("Session runtime is gone")]
    RuntimeGone,
}

/// Handle to interact with a running session
#[derive(Clone)]
pub struct SessionHandle {
    pub event_tx: mpsc::Sender<Envelope>,
    pub broadcast_tx: broadcast::Sender<SseEvent>,
    pub transcript: Arc<RwLock<ConversationState>>,
    pub view_rx: watch::Receiver<EngineView>,
    pub playback: Arc<ClientPlayback>,
}

impl SessionHandle {
    /// Send a command and wait for the engine to accept or reject it
    pub async fn dispatch(&self, event: Event) -> Result<(), RuntimeError> {
        let (envelope, reply_rx) = Envelope::command(event);
        self.event_tx
            .send(envelope)
            .await
            .map_err(|_| RuntimeError::RuntimeGone)?;
        reply_rx.await.map_err(|_| RuntimeError::RuntimeGone)??;
        Ok(())
    }

    pub async fn snapshot(&self) -> (ConversationState, EngineView) {
        let conversation = self.transcript.read().await.clone();
        (conversation, self.view_rx.borrow().clone())
    }
}

/// Manager for all session runtimes
pub struct RuntimeManager {
    completions: Arc<RegistryCompletionClient>,
    speech: Arc<ServiceSynthesizer>,
    default_model: String,
    settings: EngineSettings,
    sessions: RwLock<HashMap<String, SessionHandle>>,
    /// When each session was first seen without an SSE subscriber
    unwatched: Mutex<HashMap<String, Instant>>,
}

impl RuntimeManager {
    pub fn new(
        llm_registry: Arc<ModelRegistry>,
        speech: Option<Arc<dyn SpeechService>>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            default_model: llm_registry.default_model_id().to_string(),
            completions: Arc::new(RegistryCompletionClient::new(llm_registry)),
            speech: Arc::new(ServiceSynthesizer::new(speech)),
            settings,
            sessions: RwLock::new(HashMap::new()),
            unwatched: Mutex::new(HashMap::new()),
        }
    }

    /// Mount a new session with default agents and start its runtime
    pub async fn create_session(&self) -> (String, AgentPair) {
        let session_id = uuid::Uuid::new_v4().to_string();
        let agents = AgentPair::with_default_model(&self.default_model);

        let (event_tx, event_rx) = mpsc::channel(INBOX_CAPACITY);
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let (view_tx, view_rx) = watch::channel(EngineView {
            state: EngineState::Idle,
            agents: agents.clone(),
        });
        let transcript = Arc::new(RwLock::new(ConversationState::new(
            self.settings.max_messages,
        )));
        let playback = Arc::new(ClientPlayback::new(&session_id, broadcast_tx.clone()));

        let runtime: ProductionRuntime = ConversationRuntime::new(
            EngineContext::new(&session_id, self.settings, agents.clone()),
            transcript.clone(),
            self.completions.clone(),
            self.speech.clone(),
            playback.clone(),
            event_rx,
            event_tx.clone(),
            broadcast_tx.clone(),
            view_tx,
        );
        tokio::spawn(runtime.run());

        let handle = SessionHandle {
            event_tx,
            broadcast_tx,
            transcript,
            view_rx,
            playback,
        };
        self.sessions
            .write()
            .await
            .insert(session_id.clone(), handle);

        tracing::info!(session_id = %session_id, model = %self.default_model, "Session created");
        (session_id, agents)
    }

    pub async fn get(&self, session_id: &str) -> Result<SessionHandle, RuntimeError> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| RuntimeError::SessionNotFound(session_id.to_string()))
    }

    /// Send a command to a session
    pub async fn dispatch(&self, session_id: &str, event: Event) -> Result<(), RuntimeError> {
        self.get(session_id).await?.dispatch(event).await
    }

    /// Subscribe to session updates, returning the initial snapshot event
    pub async fn subscribe(
        &self,
        session_id: &str,
    ) -> Result<(SseEvent, broadcast::Receiver<SseEvent>), RuntimeError> {
        let handle = self.get(session_id).await?;
        // Subscribe before snapshotting so nothing falls between the two
        let rx = handle.broadcast_tx.subscribe();
        let (conversation, engine) = handle.snapshot().await;
        Ok((
            SseEvent::Init {
                conversation,
                engine,
            },
            rx,
        ))
    }

    /// Abort everything the session has in flight and drop it
    pub async fn teardown(&self, session_id: &str) -> Result<(), RuntimeError> {
        let handle = self
            .sessions
            .write()
            .await
            .remove(session_id)
            .ok_or_else(|| RuntimeError::SessionNotFound(session_id.to_string()))?;

        // The runtime exits after handling teardown; a dead runtime is already gone
        if let Err(e) = handle.dispatch(Event::Teardown).await {
            tracing::debug!(session_id = %session_id, error = %e, "Teardown after runtime exit");
        }
        tracing::info!(session_id = %session_id, "Session torn down");
        Ok(())
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Tear down sessions that have had no SSE subscriber for `grace`
    ///
    /// A closed tab never sends `DELETE`, so this is what stops an abandoned
    /// conversation. The clock starts at the first sweep that finds the
    /// session unwatched and resets whenever a subscriber reconnects.
    pub async fn reap_unwatched(&self, grace: Duration) -> usize {
        let now = Instant::now();
        let expired: Vec<String> = {
            let sessions = self.sessions.read().await;
            let mut unwatched = self.unwatched.lock().unwrap_or_else(PoisonError::into_inner);
            unwatched.retain(|id, _| {
                sessions
                    .get(id)
                    .is_some_and(|h| h.broadcast_tx.receiver_count() == 0)
            });

            sessions
                .iter()
                .filter(|(_, handle)| handle.broadcast_tx.receiver_count() == 0)
                .filter_map(|(id, _)| {
                    let since = *unwatched.entry(id.clone()).or_insert(now);
                    (now.duration_since(since) >= grace).then(|| id.clone())
                })
                .collect()
        };

        for session_id in &expired {
            self.unwatched
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(session_id);
            if let Err(e) = self.teardown(session_id).await {
                tracing::debug!(session_id = %session_id, error = %e, "Session already gone");
                continue;
            }
            tracing::info!(session_id = %session_id, grace_secs = grace.as_secs(), "Reaped unwatched session");
        }
        expired.len()
    }
}
