use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::feed::FetchError;
use crate::storage::{Database, DatabaseError, Feed, InsertOutcome, NewPost};

/// Feed bookkeeping consumed by the scheduler and workers.
#[async_trait]
pub trait FeedStore: Send + Sync {
    /// Up to `limit` feeds, never-fetched first, then oldest `last_fetched_at`.
    async fn select_feeds_to_fetch(&self, limit: usize) -> Result<Vec<Feed>, DatabaseError>;

    async fn mark_feed_fetched(&self, feed_id: i64, at: DateTime<Utc>)
        -> Result<(), DatabaseError>;
}

/// Idempotent post persistence keyed by (feed, item link).
#[async_trait]
pub trait PostStore: Send + Sync {
    async fn create_post_if_absent(&self, post: &NewPost) -> Result<InsertOutcome, DatabaseError>;
}

/// Raw document retrieval. Implementations own their timeout.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

#[async_trait]
impl FeedStore for Database {
    async fn select_feeds_to_fetch(&self, limit: usize) -> Result<Vec<Feed>, DatabaseError> {
        Database::select_feeds_to_fetch(self, limit).await
    }

    async fn mark_feed_fetched(
        &self,
        feed_id: i64,
        at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        Database::mark_feed_fetched(self, feed_id, at).await
    }
}

#[async_trait]
impl PostStore for Database {
    async fn create_post_if_absent(&self, post: &NewPost) -> Result<InsertOutcome, DatabaseError> {
        Database::create_post_if_absent(self, post).await
    }
}
