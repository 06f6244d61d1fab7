//! Trait abstractions for runtime I/O
//!
//! The executor only talks to the outside world through these, so tests can
//! swap in mocks.

use crate::agent::Voice;
use crate::llm::{LlmError, LlmRequest, LlmResponse, ModelRegistry};
use crate::narration::{Audio, ClientPlayback, NarrationError, SpeechService};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Client for chat completions
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Complete a request for whichever model it names
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;
}

/// Text-to-speech
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice: Voice) -> Result<Audio, NarrationError>;
}

/// Plays a clip to completion
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    /// Resolves when playback finishes, fails, or `cancel` fires
    async fn play(
        &self,
        message_id: &str,
        audio: Audio,
        cancel: CancellationToken,
    ) -> Result<(), NarrationError>;

    /// Drop anything cached for the session
    fn reset(&self) {}
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: CompletionClient + ?Sized> CompletionClient for Arc<T> {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        (**self).complete(request).await
    }
}

#[async_trait]
impl<T: SpeechSynthesizer + ?Sized> SpeechSynthesizer for Arc<T> {
    async fn synthesize(&self, text: &str, voice: Voice) -> Result<Audio, NarrationError> {
        (**self).synthesize(text, voice).await
    }
}

#[async_trait]
impl<T: AudioPlayer + ?Sized> AudioPlayer for Arc<T> {
    async fn play(
        &self,
        message_id: &str,
        audio: Audio,
        cancel: CancellationToken,
    ) -> Result<(), NarrationError> {
        (**self).play(message_id, audio, cancel).await
    }

    fn reset(&self) {
        (**self).reset();
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use `ModelRegistry` as `CompletionClient`
pub struct RegistryCompletionClient {
    registry: Arc<ModelRegistry>,
}

impl RegistryCompletionClient {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl CompletionClient for RegistryCompletionClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let service = self.registry.service_for(&request.model)?;
        service.complete(request).await
    }
}

/// Adapter to use an optional `SpeechService` as `SpeechSynthesizer`
pub struct ServiceSynthesizer {
    service: Option<Arc<dyn SpeechService>>,
}

impl ServiceSynthesizer {
    pub fn new(service: Option<Arc<dyn SpeechService>>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl SpeechSynthesizer for ServiceSynthesizer {
    async fn synthesize(&self, text: &str, voice: Voice) -> Result<Audio, NarrationError> {
        let service = self.service.as_ref().ok_or(NarrationError::Unavailable)?;
        service.synthesize(text, voice).await
    }
}

#[async_trait]
impl AudioPlayer for ClientPlayback {
    async fn play(
        &self,
        message_id: &str,
        audio: Audio,
        cancel: CancellationToken,
    ) -> Result<(), NarrationError> {
        ClientPlayback::play(self, message_id, audio, cancel).await
    }

    fn reset(&self) {
        ClientPlayback::reset(self);
    }
}
