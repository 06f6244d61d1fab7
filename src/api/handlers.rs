//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{
    CreateSessionResponse, ErrorResponse, HumanMessageRequest, MessageAcceptedResponse,
    ModelsResponse, PlaybackAckResponse, SessionResponse, StartRequest, SuccessResponse,
    VoicesResponse,
};
use super::AppState;
use crate::agent::{AgentConfig, AgentSlot, Voice};
use crate::db::SharedConversation;
use crate::runtime::RuntimeError;
use crate::share::{ShareError, ShareLink};
use crate::state_machine::{Event, TransitionError};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Session lifecycle
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session).delete(delete_session))
        .route("/api/sessions/:id/stream", get(stream_session))
        // Agent configuration
        .route("/api/sessions/:id/agents/:slot", put(update_agent))
        // Conversation control
        .route("/api/sessions/:id/start", post(start_conversation))
        .route("/api/sessions/:id/stop", post(stop_conversation))
        .route("/api/sessions/:id/clear", post(clear_conversation))
        .route("/api/sessions/:id/messages", post(post_human_message))
        // Narration playback
        .route("/api/sessions/:id/audio/:message_id", get(get_audio))
        .route("/api/sessions/:id/audio/:message_id/done", post(audio_done))
        // Sharing
        .route("/api/sessions/:id/share", post(share_session))
        .route("/api/share/:id", get(get_shared))
        // Catalogs
        .route("/api/models", get(list_models))
        .route("/api/voices", get(list_voices))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Session Lifecycle
// ============================================================

async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<CreateSessionResponse>) {
    let (session_id, agents) = state.runtime.create_session().await;
    (
        StatusCode::CREATED,
        Json(CreateSessionResponse { session_id, agents }),
    )
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let handle = state.runtime.get(&id).await?;
    let (conversation, engine) = handle.snapshot().await;
    Ok(Json(SessionResponse {
        conversation,
        engine,
    }))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.runtime.teardown(&id).await?;
    Ok(Json(SuccessResponse::ok()))
}

async fn stream_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let (init, rx) = state.runtime.subscribe(&id).await?;
    Ok(sse_stream(init, rx))
}

// ============================================================
// Agent Configuration
// ============================================================

async fn update_agent(
    State(state): State<AppState>,
    Path((id, slot)): Path<(String, String)>,
    Json(config): Json<AgentConfig>,
) -> Result<Json<SuccessResponse>, AppError> {
    let slot = AgentSlot::parse(&slot)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown agent slot: {slot}")))?;
    state
        .runtime
        .dispatch(&id, Event::UpdateAgent { slot, config })
        .await?;
    Ok(Json(SuccessResponse::ok()))
}

// ============================================================
// Conversation Control
// ============================================================

async fn start_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<StartRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    let event = Event::Start {
        direction: req.direction,
        seed: req.seed,
        seed_id: uuid::Uuid::new_v4().to_string(),
    };
    state.runtime.dispatch(&id, event).await?;
    Ok(Json(SuccessResponse::ok()))
}

async fn stop_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.runtime.dispatch(&id, Event::Stop).await?;
    Ok(Json(SuccessResponse::ok()))
}

async fn clear_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.runtime.dispatch(&id, Event::Clear).await?;
    Ok(Json(SuccessResponse::ok()))
}

async fn post_human_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<HumanMessageRequest>,
) -> Result<Json<MessageAcceptedResponse>, AppError> {
    let message_id = uuid::Uuid::new_v4().to_string();
    state
        .runtime
        .dispatch(
            &id,
            Event::HumanMessage {
                id: message_id.clone(),
                text: req.content,
            },
        )
        .await?;
    Ok(Json(MessageAcceptedResponse { id: message_id }))
}

// ============================================================
// Narration Playback
// ============================================================

async fn get_audio(
    State(state): State<AppState>,
    Path((id, message_id)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let handle = state.runtime.get(&id).await?;
    let clip = handle
        .playback
        .clip(&message_id)
        .ok_or_else(|| AppError::NotFound(format!("No audio for message {message_id}")))?;

    Ok((
        [
            (header::CONTENT_TYPE, clip.mime_type.clone()),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
        clip.bytes.clone(),
    )
        .into_response())
}

async fn audio_done(
    State(state): State<AppState>,
    Path((id, message_id)): Path<(String, String)>,
) -> Result<Json<PlaybackAckResponse>, AppError> {
    let handle = state.runtime.get(&id).await?;
    let acknowledged = handle.playback.acknowledge(&message_id);
    Ok(Json(PlaybackAckResponse { acknowledged }))
}

// ============================================================
// Sharing
// ============================================================

async fn share_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<ShareLink>), AppError> {
    let handle = state.runtime.get(&id).await?;
    let (conversation, engine) = handle.snapshot().await;
    let share = state.share.clone();
    let link = tokio::task::spawn_blocking(move || {
        share.create_snapshot(
            conversation.messages(),
            &engine.agents,
            conversation.has_audio(),
            Utc::now(),
        )
    })
    .await
    .map_err(|e| AppError::Internal(format!("Snapshot task failed: {e}")))??;
    Ok((StatusCode::CREATED, Json(link)))
}

async fn get_shared(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SharedConversation>, AppError> {
    let share = state.share.clone();
    let snapshot = tokio::task::spawn_blocking(move || share.fetch_snapshot(&id, Utc::now()))
        .await
        .map_err(|e| AppError::Internal(format!("Snapshot task failed: {e}")))??;
    Ok(Json(snapshot))
}

// ============================================================
// Catalogs
// ============================================================

async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    Json(ModelsResponse {
        models: state.llm_registry.available_model_info(),
        default: state.llm_registry.default_model_id().to_string(),
    })
}

async fn list_voices(State(state): State<AppState>) -> Json<VoicesResponse> {
    Json(VoicesResponse {
        voices: Voice::ALL.to_vec(),
        narration_available: state.narration_available,
    })
}

// ============================================================
// Version
// ============================================================

async fn get_version() -> &'static str {
    concat!("duologue ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Gone(String),
    Internal(String),
}

impl From<RuntimeError> for AppError {
    fn from(e: RuntimeError) -> Self {
        match e {
            RuntimeError::SessionNotFound(_) => AppError::NotFound(e.to_string()),
            RuntimeError::Transition(TransitionError::Validation(_)) => {
                AppError::BadRequest(e.to_string())
            }
            RuntimeError::Transition(TransitionError::AlreadyActive) => {
                AppError::Conflict(e.to_string())
            }
            RuntimeError::RuntimeGone => AppError::Internal(e.to_string()),
        }
    }
}

impl From<ShareError> for AppError {
    fn from(e: ShareError) -> Self {
        match e {
            ShareError::EmptyTranscript => AppError::BadRequest(e.to_string()),
            ShareError::NotFound(_) => AppError::NotFound(e.to_string()),
            ShareError::Expired(_) => AppError::Gone(e.to_string()),
            ShareError::Db(_) => {
                tracing::error!(error = %e, "Snapshot storage failed");
                AppError::Internal(e.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Gone(msg) => (StatusCode::GONE, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
