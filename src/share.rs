//! Shareable, expiring read-only snapshots of a conversation

use crate::agent::AgentPair;
use crate::db::{Database, DbError, SharedConversation};
use crate::transcript::Message;
use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use thiserror::Error;

/// How long a shared link stays readable
pub const SHARE_TTL_DAYS: i64 = 30;

const SHARE_ID_LEN: usize = 12;
const MAX_ID_ATTEMPTS: usize = 3;

#[derive(Debug, Error)]
pub enum ShareError {
    #[error("Cannot share an empty conversation")]
    EmptyTranscript,
    #[error("Shared conversation not found: {0}")]
    NotFound(String),
    #[error("Shared conversation has expired: {0}")]
    Expired(String),
    #[error(transparent)]
    Db(#[from] DbError),
}

/// Where a new snapshot can be read
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShareLink {
    pub id: String,
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

pub struct ShareService {
    db: Database,
    public_base_url: String,
}

impl ShareService {
    pub fn new(db: Database, public_base_url: impl Into<String>) -> Self {
        let public_base_url = public_base_url.into().trim_end_matches('/').to_string();
        Self {
            db,
            public_base_url,
        }
    }

    pub fn create_snapshot(
        &self,
        messages: &[Message],
        agents: &AgentPair,
        has_audio: bool,
        now: DateTime<Utc>,
    ) -> Result<ShareLink, ShareError> {
        let first = messages.first().ok_or(ShareError::EmptyTranscript)?;

        let mut snapshot = SharedConversation {
            id: generate_share_id(),
            messages: messages.to_vec(),
            agents: agents.clone(),
            created_at: first.timestamp,
            shared_at: now,
            expires_at: now + Duration::days(SHARE_TTL_DAYS),
            has_audio,
        };

        let mut attempt = 1;
        loop {
            match self.db.insert_snapshot(&snapshot) {
                Ok(()) => break,
                Err(DbError::DuplicateId(_)) if attempt < MAX_ID_ATTEMPTS => {
                    attempt += 1;
                    snapshot.id = generate_share_id();
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::info!(
            share_id = %snapshot.id,
            messages = snapshot.messages.len(),
            has_audio,
            "Conversation shared"
        );

        Ok(ShareLink {
            url: format!("{}/share/{}", self.public_base_url, snapshot.id),
            id: snapshot.id,
            expires_at: snapshot.expires_at,
        })
    }

    /// Load a snapshot, checking expiry against `now`
    pub fn fetch_snapshot(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> Result<SharedConversation, ShareError> {
        let snapshot = self
            .db
            .get_snapshot(id)?
            .ok_or_else(|| ShareError::NotFound(id.to_string()))?;
        if snapshot.is_expired(now) {
            return Err(ShareError::Expired(id.to_string()));
        }
        Ok(snapshot)
    }

    pub fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, ShareError> {
        Ok(self.db.delete_expired(now)?)
    }
}

fn generate_share_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SHARE_ID_LEN)
        .map(char::from)
        .collect()
}
