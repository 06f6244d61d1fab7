//! `OpenAI` speech endpoint

use super::{truncate_for_speech, Audio, NarrationError, SpeechService};
use crate::agent::Voice;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct OpenAITtsService {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl OpenAITtsService {
    pub fn new(api_key: String, base_url: &str, model: &str) -> Result<Self, NarrationError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| NarrationError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            endpoint: format!("{}/audio/speech", base_url.trim_end_matches('/')),
            model: model.to_string(),
        })
    }

    fn build_request<'a>(&'a self, input: &'a str, voice: Voice) -> SpeechRequest<'a> {
        SpeechRequest {
            model: &self.model,
            input,
            voice: voice.as_str(),
            response_format: "mp3",
        }
    }
}

#[async_trait]
impl SpeechService for OpenAITtsService {
    async fn synthesize(&self, text: &str, voice: Voice) -> Result<Audio, NarrationError> {
        let input = truncate_for_speech(text);
        let request = self.build_request(&input, voice);

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| NarrationError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<SpeechErrorResponse>(&body)
                .map_or(body, |resp| resp.error.message);
            return Err(NarrationError::Service {
                status: status.as_u16(),
                message,
            });
        }

        let mime_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| v.starts_with("audio/"))
            .unwrap_or("audio/mpeg")
            .to_string();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| NarrationError::Network(format!("Failed to read audio: {e}")))?;
        if bytes.is_empty() {
            return Err(NarrationError::EmptyAudio);
        }

        Ok(Audio {
            bytes: bytes.to_vec(),
            mime_type,
        })
    }
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct SpeechErrorResponse {
    error: SpeechError,
}

#[derive(Debug, Deserialize)]
struct SpeechError {
    message: String,
}
