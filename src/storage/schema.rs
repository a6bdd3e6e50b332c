use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::types::DatabaseError;

// ============================================================================
// Database
// ============================================================================

/// SQLite-backed feed and post store.
///
/// Cloning is cheap (the pool is reference counted); every ingestion worker in
/// a batch shares the same pool.
#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

impl Database {
    /// Open a database connection and run migrations
    ///
    /// `":memory:"` opens a private in-memory database, used by tests.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Locked` if another process holds the database
    /// (SQLITE_BUSY, SQLITE_LOCKED, SQLITE_CANTOPEN).
    /// Returns `DatabaseError::Migration` if the schema could not be created.
    pub async fn open(path: &str) -> Result<Self, DatabaseError> {
        let url = format!("sqlite:{}?mode=rwc", path);
        let in_memory = path == ":memory:";

        // busy_timeout=5000: concurrent workers wait up to 5 seconds for the
        // single SQLite writer lock instead of failing with SQLITE_BUSY.
        let mut options = SqliteConnectOptions::from_str(&url)
            .map_err(DatabaseError::from_sqlx)?
            .pragma("busy_timeout", "5000")
            .foreign_keys(true);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // An in-memory database lives and dies with its connection, so tests
        // get a single shared connection.
        let max_connections = if in_memory { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        let db = Self { pool };
        db.migrate().await.map_err(DatabaseError::from_migration)?;

        tracing::debug!(path = %path, "Database opened");
        Ok(db)
    }

    /// Run database migrations atomically within a transaction.
    ///
    /// All statements use `IF NOT EXISTS`, so re-running on an existing
    /// database is a no-op.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feeds (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                url TEXT UNIQUE NOT NULL,
                owner_id TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                last_fetched_at INTEGER
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // UNIQUE(feed_id, url) is the only deduplication mechanism for posts;
        // concurrent workers rely on it instead of an in-process lock.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY,
                feed_id INTEGER NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                url TEXT NOT NULL,
                description TEXT,
                published_at INTEGER,
                created_at INTEGER NOT NULL,
                UNIQUE(feed_id, url)
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // Stale-first batch selection scans feeds by last_fetched_at
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_feeds_last_fetched ON feeds(last_fetched_at)",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_posts_feed_published ON posts(feed_id, published_at DESC)",
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }
}
