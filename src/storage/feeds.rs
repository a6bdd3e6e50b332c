use chrono::{DateTime, Utc};

use super::schema::Database;
use super::types::{DatabaseError, Feed, FeedDbRow};

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Insert a feed, or rename it if the URL is already subscribed.
    ///
    /// Returns the feed ID. `last_fetched_at` of an existing feed is untouched.
    pub async fn insert_feed(
        &self,
        url: &str,
        name: &str,
        owner_id: &str,
    ) -> Result<i64, DatabaseError> {
        let now = Utc::now().timestamp();
        let result: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO feeds (name, url, owner_id, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(url) DO UPDATE SET name = excluded.name
            RETURNING id
        "#,
        )
        .bind(name)
        .bind(url)
        .bind(owner_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(result.0)
    }

    /// Get all feeds ordered by name
    pub async fn get_feeds(&self) -> Result<Vec<Feed>, DatabaseError> {
        let rows = sqlx::query_as::<_, FeedDbRow>(
            r#"
            SELECT id, name, url, owner_id, created_at, last_fetched_at
            FROM feeds
            ORDER BY name, id
        "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(FeedDbRow::into_feed).collect())
    }

    pub async fn get_feed(&self, feed_id: i64) -> Result<Option<Feed>, DatabaseError> {
        let row = sqlx::query_as::<_, FeedDbRow>(
            r#"
            SELECT id, name, url, owner_id, created_at, last_fetched_at
            FROM feeds
            WHERE id = ?
        "#,
        )
        .bind(feed_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(FeedDbRow::into_feed))
    }

    // ========================================================================
    // Scheduling Operations
    // ========================================================================

    /// Select up to `limit` feeds, stale first.
    ///
    /// Feeds that were never fetched come first, then the ones with the oldest
    /// `last_fetched_at`. Ties break on ID so selection is deterministic.
    pub async fn select_feeds_to_fetch(&self, limit: usize) -> Result<Vec<Feed>, DatabaseError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, FeedDbRow>(
            r#"
            SELECT id, name, url, owner_id, created_at, last_fetched_at
            FROM feeds
            ORDER BY last_fetched_at ASC NULLS FIRST, id ASC
            LIMIT ?
        "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(FeedDbRow::into_feed).collect())
    }

    /// Record a fetch attempt for a feed.
    ///
    /// `last_fetched_at` never moves backwards: an older timestamp than the
    /// stored one leaves the column as is.
    pub async fn mark_feed_fetched(
        &self,
        feed_id: i64,
        at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE feeds
            SET last_fetched_at = MAX(COALESCE(last_fetched_at, ?1), ?1)
            WHERE id = ?2
        "#,
        )
        .bind(at.timestamp())
        .bind(feed_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(feed_id));
        }
        Ok(())
    }
}
