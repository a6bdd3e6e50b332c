use chrono::{DateTime, TimeZone, Utc};
use sqlx::FromRow;
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process holds a lock on the database file
    #[error("Database is locked by another process. Is another gleaner instance running?")]
    Locked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// The referenced feed does not exist
    #[error("Feed {0} not found")]
    NotFound(i64),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

// SQLite primary result codes that mean another connection holds the file
const SQLITE_BUSY: i64 = 5;
const SQLITE_LOCKED: i64 = 6;
const SQLITE_CANTOPEN: i64 = 14;

fn is_lock_error(err: &sqlx::Error) -> bool {
    if let Some(code) = err
        .as_database_error()
        .and_then(|db| db.code())
        .and_then(|code| code.parse::<i64>().ok())
    {
        // Extended codes carry the primary code in the low byte
        return matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED | SQLITE_CANTOPEN);
    }
    // Errors raised before a statement runs only carry the message
    let message = err.to_string().to_lowercase();
    message.contains("database is locked") || message.contains("unable to open database file")
}

impl DatabaseError {
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if is_lock_error(&err) {
            DatabaseError::Locked
        } else {
            DatabaseError::Other(err)
        }
    }

    pub(crate) fn from_migration(err: sqlx::Error) -> Self {
        if is_lock_error(&err) {
            DatabaseError::Locked
        } else {
            DatabaseError::Migration(err.to_string())
        }
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// A subscribed feed and its fetch bookkeeping.
#[derive(Debug, Clone)]
pub struct Feed {
    pub id: i64,
    /// Display name (Arc for cheap clones into per-feed workers and log fields)
    pub name: Arc<str>,
    pub url: String,
    /// Owning account reference, opaque to the ingestion pipeline
    pub owner_id: String,
    pub created_at: i64,
    /// Unix seconds of the last fetch attempt; `None` until the first tick picks it up
    pub last_fetched_at: Option<i64>,
}

impl Feed {
    pub fn last_fetched(&self) -> Option<DateTime<Utc>> {
        self.last_fetched_at
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
    }
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct FeedDbRow {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub owner_id: String,
    pub created_at: i64,
    pub last_fetched_at: Option<i64>,
}

impl FeedDbRow {
    pub(crate) fn into_feed(self) -> Feed {
        Feed {
            id: self.id,
            name: Arc::from(self.name),
            url: self.url,
            owner_id: self.owner_id,
            created_at: self.created_at,
            last_fetched_at: self.last_fetched_at,
        }
    }
}

/// A stored item belonging to a feed. Unique per (feed_id, url).
#[derive(Debug, Clone, FromRow)]
pub struct Post {
    pub id: i64,
    pub feed_id: i64,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub published_at: Option<i64>,
    pub created_at: i64,
}

/// Insert request for [`Database::create_post_if_absent`](super::Database::create_post_if_absent).
#[derive(Debug, Clone)]
pub struct NewPost {
    pub feed_id: i64,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Outcome of an idempotent post insert.
///
/// Errors travel separately as `Err(DatabaseError)`, so together with this
/// enum the caller sees created / duplicate / error as distinct cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Created,
    /// A post with the same (feed, url) already exists; nothing was written
    Duplicate,
}
