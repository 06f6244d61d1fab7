//! Text-to-speech narration
//!
//! Synthesizes spoken audio for agent messages and hands the clips to the
//! connected client for playback.

mod openai_tts;
mod player;

pub use openai_tts::OpenAITtsService;
pub use player::ClientPlayback;

use crate::agent::Voice;
use crate::llm::OPENAI_BASE_URL;
use async_trait::async_trait;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Longest input the speech endpoint accepts
pub const MAX_NARRATION_CHARS: usize = 4096;

pub const DEFAULT_TTS_MODEL: &str = "tts-1";

/// Lower bound on the encoded bitrate, so duration estimates err long
const MIN_BITS_PER_SECOND: u64 = 24_000;

/// A synthesized clip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Audio {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl Audio {
    #[cfg(test)]
    pub fn mpeg(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            mime_type: "audio/mpeg".to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Upper estimate of how long the clip plays
    pub fn estimated_duration(&self) -> Duration {
        let bits = self.bytes.len() as u64 * 8;
        Duration::from_millis(bits * 1000 / MIN_BITS_PER_SECOND)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NarrationError {
    #[error("Narration is not configured")]
    Unavailable,
    #[error("Speech service returned {status}: {message}")]
    Service { status: u16, message: String },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Speech service returned no audio")]
    EmptyAudio,
    #[error("No client is listening for narration")]
    NoListener,
    #[error("Client did not finish playback in time")]
    TimedOut,
    #[error("Narration cancelled")]
    Cancelled,
}

/// Cut text to what the speech endpoint accepts, on a char boundary
pub fn truncate_for_speech(text: &str) -> Cow<'_, str> {
    if text.chars().count() <= MAX_NARRATION_CHARS {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(text.chars().take(MAX_NARRATION_CHARS).collect())
    }
}

/// Common interface for speech providers
#[async_trait]
pub trait SpeechService: Send + Sync {
    async fn synthesize(&self, text: &str, voice: Voice) -> Result<Audio, NarrationError>;
}

/// Speech provider settings
#[derive(Debug, Clone, Default)]
pub struct TtsConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
}

impl TtsConfig {
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            api_key: var("OPENAI_API_KEY"),
            base_url: var("OPENAI_BASE_URL"),
            model: var("DUOLOGUE_TTS_MODEL"),
        }
    }

    /// Build the configured speech service, if any
    pub fn service(&self) -> Option<Arc<dyn SpeechService>> {
        let api_key = self.api_key.clone()?;
        let base_url = self.base_url.as_deref().unwrap_or(OPENAI_BASE_URL);
        let model = self.model.as_deref().unwrap_or(DEFAULT_TTS_MODEL);

        match OpenAITtsService::new(api_key, base_url, model) {
            Ok(service) => Some(Arc::new(service)),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to create speech service; narration disabled");
                None
            }
        }
    }
}
