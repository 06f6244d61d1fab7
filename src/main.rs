//! Duologue - two AI agents in conversation
//!
//! A Rust backend that alternates turns between two configured LLM agents,
//! optionally narrates each reply, and publishes expiring read-only snapshots.

mod agent;
mod api;
mod config;
mod db;
mod llm;
mod narration;
mod runtime;
mod share;
mod state_machine;
mod transcript;

use api::{create_router, AppState};
use config::AppConfig;
use db::Database;
use llm::ModelRegistry;
use runtime::RuntimeManager;
use share::ShareService;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);
const REAP_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "duologue=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = AppConfig::from_env();

    tracing::info!(path = %config.db_path.display(), "Opening database");
    let db = Database::open(&config.db_path)?;

    let llm_registry = Arc::new(ModelRegistry::new(&config.llm));
    if !llm_registry.has_models() {
        tracing::warn!(
            "No LLM API keys configured. Set ANTHROPIC_API_KEY, OPENAI_API_KEY or OPENROUTER_API_KEY."
        );
    }

    let speech = config.tts.service();
    let narration_available = speech.is_some();
    if !narration_available {
        tracing::info!("Narration disabled: no speech provider configured");
    }

    let runtime = Arc::new(RuntimeManager::new(
        llm_registry.clone(),
        speech,
        config.engine,
    ));
    let share = Arc::new(ShareService::new(db, config.public_url.clone()));

    spawn_purge_task(share.clone());
    spawn_reaper_task(runtime.clone(), config.session_idle_timeout);

    let state = AppState::new(runtime, llm_registry, share, narration_available);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state)
        .layer(cors)
        .layer(compression)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, public_url = %config.public_url, "Duologue server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Periodically drop snapshots past their expiry
fn spawn_purge_task(share: Arc<ShareService>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            interval.tick().await;
            let share = share.clone();
            let purged =
                tokio::task::spawn_blocking(move || share.purge_expired(chrono::Utc::now())).await;
            match purged {
                Ok(Ok(0)) => {}
                Ok(Ok(purged)) => tracing::info!(purged, "Purged expired shared conversations"),
                Ok(Err(e)) => tracing::warn!(error = %e, "Failed to purge expired shares"),
                Err(e) => tracing::error!(error = %e, "Purge task panicked"),
            }
        }
    });
}

/// Tear down sessions whose browser went away without saying so
fn spawn_reaper_task(runtime: Arc<RuntimeManager>, idle_timeout: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(REAP_INTERVAL);
        loop {
            interval.tick().await;
            let reaped = runtime.reap_unwatched(idle_timeout).await;
            if reaped > 0 {
                let remaining = runtime.session_count().await;
                tracing::info!(
                    reaped,
                    remaining,
                    "Reaped unwatched sessions"
                );
            }
        }
    });
}
