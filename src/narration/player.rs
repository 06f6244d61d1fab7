//! Client-side playback
//!
//! The server never plays audio itself. A synthesized clip is cached, the
//! session's SSE subscribers are told where to fetch it, and playback counts
//! as finished once the client acknowledges it.

use super::{Audio, NarrationError};
use crate::runtime::SseEvent;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};
use tokio_util::sync::CancellationToken;

/// Extra time granted on top of the clip's estimated length
pub const PLAYBACK_SLACK: Duration = Duration::from_secs(10);

/// Clips kept around for replay
const MAX_CACHED_CLIPS: usize = 32;

#[derive(Default)]
struct ClipCache {
    clips: HashMap<String, Arc<Audio>>,
    order: VecDeque<String>,
}

impl ClipCache {
    fn insert(&mut self, message_id: &str, audio: Arc<Audio>) {
        if self.clips.insert(message_id.to_string(), audio).is_none() {
            self.order.push_back(message_id.to_string());
        }
        while self.order.len() > MAX_CACHED_CLIPS {
            if let Some(oldest) = self.order.pop_front() {
                self.clips.remove(&oldest);
            }
        }
    }
}

/// Playback through the browser attached to one session
pub struct ClientPlayback {
    session_id: String,
    broadcast_tx: broadcast::Sender<SseEvent>,
    cache: Mutex<ClipCache>,
    pending: Mutex<HashMap<String, oneshot::Sender<()>>>,
    slack: Duration,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ClientPlayback {
    pub fn new(session_id: impl Into<String>, broadcast_tx: broadcast::Sender<SseEvent>) -> Self {
        Self {
            session_id: session_id.into(),
            broadcast_tx,
            cache: Mutex::new(ClipCache::default()),
            pending: Mutex::new(HashMap::new()),
            slack: PLAYBACK_SLACK,
        }
    }

    #[cfg(test)]
    #[must_use]
    pub fn with_slack(mut self, slack: Duration) -> Self {
        self.slack = slack;
        self
    }

    pub fn audio_url(&self, message_id: &str) -> String {
        format!("/api/sessions/{}/audio/{message_id}", self.session_id)
    }

    /// Hand a clip to the client and wait until it reports playback finished
    pub async fn play(
        &self,
        message_id: &str,
        audio: Audio,
        cancel: CancellationToken,
    ) -> Result<(), NarrationError> {
        if audio.is_empty() {
            return Err(NarrationError::EmptyAudio);
        }
        if self.broadcast_tx.receiver_count() == 0 {
            return Err(NarrationError::NoListener);
        }

        let deadline = audio.estimated_duration() + self.slack;
        let mime_type = audio.mime_type.clone();
        lock(&self.cache).insert(message_id, Arc::new(audio));

        let (done_tx, done_rx) = oneshot::channel();
        lock(&self.pending).insert(message_id.to_string(), done_tx);

        let _ = self.broadcast_tx.send(SseEvent::Narration {
            message_id: message_id.to_string(),
            mime_type,
            url: self.audio_url(message_id),
        });

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(NarrationError::Cancelled),
            done = tokio::time::timeout(deadline, done_rx) => match done {
                Ok(Ok(())) => Ok(()),
                // Sender dropped by `reset`
                Ok(Err(_)) => Err(NarrationError::Cancelled),
                Err(_) => Err(NarrationError::TimedOut),
            },
        };

        lock(&self.pending).remove(message_id);
        result
    }

    /// Client finished playing `message_id`; false if nothing was waiting
    pub fn acknowledge(&self, message_id: &str) -> bool {
        match lock(&self.pending).remove(message_id) {
            Some(done_tx) => done_tx.send(()).is_ok(),
            None => false,
        }
    }

    pub fn clip(&self, message_id: &str) -> Option<Arc<Audio>> {
        lock(&self.cache).clips.get(message_id).cloned()
    }

    /// Forget cached clips and release anyone waiting on playback
    pub fn reset(&self) {
        *lock(&self.cache) = ClipCache::default();
        lock(&self.pending).clear();
    }
}
