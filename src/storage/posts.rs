use chrono::Utc;

use super::schema::Database;
use super::types::{DatabaseError, InsertOutcome, NewPost, Post};

/// Maximum number of posts to return from any single query (OOM protection)
const MAX_POSTS: i64 = 2000;

impl Database {
    // ========================================================================
    // Post Operations
    // ========================================================================

    /// Insert a post unless one with the same (feed, url) already exists.
    ///
    /// The conflict target is the `UNIQUE(feed_id, url)` constraint, so a
    /// duplicate shows up as zero affected rows rather than an error. Any
    /// other constraint failure (e.g. unknown feed) is still an error.
    pub async fn create_post_if_absent(
        &self,
        post: &NewPost,
    ) -> Result<InsertOutcome, DatabaseError> {
        let now = Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO posts (feed_id, title, url, description, published_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(feed_id, url) DO NOTHING
        "#,
        )
        .bind(post.feed_id)
        .bind(&post.title)
        .bind(&post.url)
        .bind(&post.description)
        .bind(post.published_at.map(|dt| dt.timestamp()))
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            Ok(InsertOutcome::Duplicate)
        } else {
            Ok(InsertOutcome::Created)
        }
    }

    // ========================================================================
    // Post Queries
    // ========================================================================

    /// Get posts for a feed, newest first. `limit` defaults to 500 and is
    /// clamped to `0..=2000`.
    pub async fn get_posts_for_feed(
        &self,
        feed_id: i64,
        limit: Option<i64>,
    ) -> Result<Vec<Post>, DatabaseError> {
        let limit = limit.unwrap_or(500).clamp(0, MAX_POSTS);

        let rows = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, feed_id, title, url, description, published_at, created_at
            FROM posts
            WHERE feed_id = ?
            ORDER BY published_at DESC, id DESC
            LIMIT ?
        "#,
        )
        .bind(feed_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn count_posts_for_feed(&self, feed_id: i64) -> Result<i64, DatabaseError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts WHERE feed_id = ?")
            .bind(feed_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }
}
