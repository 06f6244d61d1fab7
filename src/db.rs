//! Database module for Duologue
//!
//! Persists shared conversation snapshots.

mod schema;

pub use schema::*;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Malformed snapshot payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("Snapshot already exists: {0}")]
    DuplicateId(String),
    #[error("Failed to create database directory: {0}")]
    Io(#[from] std::io::Error),
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn run_migrations(&self) -> DbResult<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // ==================== Snapshot Operations ====================

    /// Store a new snapshot; ids are never overwritten
    pub fn insert_snapshot(&self, snapshot: &SharedConversation) -> DbResult<()> {
        let messages = serde_json::to_string(&snapshot.messages)?;
        let agents = serde_json::to_string(&snapshot.agents)?;

        let result = self.conn().execute(
            "INSERT INTO shared_conversations (id, messages, agents, has_audio, created_at, shared_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                snapshot.id,
                messages,
                agents,
                snapshot.has_audio,
                format_datetime(snapshot.created_at),
                format_datetime(snapshot.shared_at),
                format_datetime(snapshot.expires_at),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(DbError::DuplicateId(snapshot.id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Get a snapshot by id, expired or not
    pub fn get_snapshot(&self, id: &str) -> DbResult<Option<SharedConversation>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, messages, agents, has_audio, created_at, shared_at, expires_at
             FROM shared_conversations WHERE id = ?1",
        )?;

        let row = stmt
            .query_row(params![id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, bool>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })
            .optional()?;

        let Some((id, messages, agents, has_audio, created_at, shared_at, expires_at)) = row else {
            return Ok(None);
        };

        Ok(Some(SharedConversation {
            id,
            messages: serde_json::from_str(&messages)?,
            agents: serde_json::from_str(&agents)?,
            has_audio,
            created_at: parse_datetime(&created_at),
            shared_at: parse_datetime(&shared_at),
            expires_at: parse_datetime(&expires_at),
        }))
    }

    /// Delete snapshots whose expiry has passed, returning how many went
    pub fn delete_expired(&self, now: DateTime<Utc>) -> DbResult<usize> {
        let deleted = self.conn().execute(
            "DELETE FROM shared_conversations WHERE expires_at <= ?1",
            params![format_datetime(now)],
        )?;
        Ok(deleted)
    }

    #[cfg(test)]
    pub fn count_snapshots(&self) -> DbResult<usize> {
        let count: i64 =
            self.conn()
                .query_row("SELECT COUNT(*) FROM shared_conversations", [], |row| {
                    row.get(0)
                })?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

/// Fixed-width UTC timestamps so stored values compare correctly as text
fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Unparseable timestamps read as already expired
fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or(DateTime::<Utc>::MIN_UTC, |dt| dt.with_timezone(&Utc))
}
