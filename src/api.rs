//! HTTP API for Duologue

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;

use crate::llm::ModelRegistry;
use crate::runtime::RuntimeManager;
use crate::share::ShareService;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<RuntimeManager>,
    pub llm_registry: Arc<ModelRegistry>,
    pub share: Arc<ShareService>,
    pub narration_available: bool,
}

impl AppState {
    pub fn new(
        runtime: Arc<RuntimeManager>,
        llm_registry: Arc<ModelRegistry>,
        share: Arc<ShareService>,
        narration_available: bool,
    ) -> Self {
        Self {
            runtime,
            llm_registry,
            share,
            narration_available,
        }
    }
}
