use chrono::Utc;
use thiserror::Error;

use super::store::{FeedSource, FeedStore, PostStore};
use crate::feed::{parse_feed, parse_pub_date, FetchError, ParseError};
use crate::storage::{DatabaseError, Feed, InsertOutcome, NewPost};

/// Reasons a feed is abandoned for the current tick.
///
/// Item-level problems never show up here; they are counted in
/// [`IngestStats`] and the worker moves on.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Could not record the fetch attempt, so no network I/O was done
    #[error("Failed to mark feed fetched: {0}")]
    MarkFetched(#[source] DatabaseError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Per-feed item accounting for one ingestion pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Items present in the document
    pub items: usize,
    pub created: usize,
    /// Items already stored for this feed
    pub duplicates: usize,
    /// Items dropped before the store: unparseable date or no link
    pub skipped: usize,
    /// Items the store rejected for a reason other than duplication
    pub failed: usize,
}

/// Outcome of one ingestion worker, correlated by feed ID.
#[derive(Debug)]
pub struct FeedReport {
    pub feed_id: i64,
    pub result: Result<IngestStats, IngestError>,
}

/// Ingest a single feed: mark fetched, fetch, parse, store each item.
///
/// Never fails as a whole; the returned [`FeedReport`] carries either the
/// item statistics or the step at which the feed was abandoned.
pub async fn ingest_feed<S, F>(store: &S, source: &F, feed: &Feed) -> FeedReport
where
    S: FeedStore + PostStore + ?Sized,
    F: FeedSource + ?Sized,
{
    let result = run_pipeline(store, source, feed).await;

    match &result {
        Ok(stats) => {
            tracing::info!(
                feed_id = feed.id,
                feed = %feed.name,
                items = stats.items,
                created = stats.created,
                duplicates = stats.duplicates,
                skipped = stats.skipped,
                failed = stats.failed,
                "Feed collected"
            );
        }
        Err(e) => {
            tracing::warn!(
                feed_id = feed.id,
                feed = %feed.name,
                url = %feed.url,
                error = %e,
                "Feed ingestion abandoned for this tick"
            );
        }
    }

    FeedReport {
        feed_id: feed.id,
        result,
    }
}

async fn run_pipeline<S, F>(store: &S, source: &F, feed: &Feed) -> Result<IngestStats, IngestError>
where
    S: FeedStore + PostStore + ?Sized,
    F: FeedSource + ?Sized,
{
    // Mark before any network I/O so a permanently broken source drifts to the
    // back of the stale-first queue instead of being retried every tick.
    store
        .mark_feed_fetched(feed.id, Utc::now())
        .await
        .map_err(IngestError::MarkFetched)?;

    let bytes = source.fetch_bytes(&feed.url).await?;
    let parsed = parse_feed(&bytes)?;

    let mut stats = IngestStats {
        items: parsed.items.len(),
        ..IngestStats::default()
    };

    // Document order, one insert at a time
    for item in parsed.items {
        if item.link.is_empty() {
            tracing::warn!(
                feed_id = feed.id,
                title = %item.title,
                "Skipping item without link"
            );
            stats.skipped += 1;
            continue;
        }

        let published_at = match parse_pub_date(&item.pub_date) {
            Ok(dt) => dt,
            Err(e) => {
                tracing::warn!(
                    feed_id = feed.id,
                    feed = %feed.name,
                    link = %item.link,
                    pub_date = %item.pub_date,
                    error = %e,
                    "Couldn't parse published date, skipping item"
                );
                stats.skipped += 1;
                continue;
            }
        };

        let post = NewPost {
            feed_id: feed.id,
            title: item.title,
            url: item.link,
            description: item.description,
            published_at: Some(published_at),
        };

        match store.create_post_if_absent(&post).await {
            Ok(InsertOutcome::Created) => stats.created += 1,
            Ok(InsertOutcome::Duplicate) => {
                tracing::debug!(feed_id = feed.id, link = %post.url, "Post already stored");
                stats.duplicates += 1;
            }
            Err(e) => {
                tracing::warn!(
                    feed_id = feed.id,
                    feed = %feed.name,
                    link = %post.url,
                    error = %e,
                    "Couldn't create post"
                );
                stats.failed += 1;
            }
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::testing::{MemoryStore, StaticSource};
    use pretty_assertions::assert_eq;

    const TWO_VALID_ONE_BROKEN: &str = r#"<rss version="2.0"><channel>
        <item><title>One</title><link>http://x/1</link><pubDate>Mon, 02 Jan 2006 15:04:05 GMT</pubDate></item>
        <item><title>Bad</title><link>http://x/bad</link><pubDate>not a date</pubDate></item>
        <item><title>Two</title><link>http://x/2</link><pubDate>2006-01-03T10:00:00Z</pubDate></item>
    </channel></rss>"#;

    fn setup(body: &str) -> (MemoryStore, StaticSource, Feed) {
        let store = MemoryStore::default();
        let feed = store.add_feed("http://x/rss", None);
        let source = StaticSource::default();
        source.set_body("http://x/rss", body);
        (store, source, feed)
    }

    #[tokio::test]
    async fn test_unparseable_date_skips_only_that_item() {
        let body = r#"<rss><channel>
            <item><link>http://x/1</link><pubDate>garbage</pubDate></item>
            <item><link>http://x/2</link><pubDate>Mon, 02 Jan 2006 15:04:05 GMT</pubDate></item>
        </channel></rss>"#;
        let (store, source, feed) = setup(body);

        let report = ingest_feed(&store, &source, &feed).await;
        let stats = report.result.unwrap();

        assert_eq!(stats.created, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(store.post_links(feed.id), vec!["http://x/2".to_string()]);
    }

    #[tokio::test]
    async fn test_two_valid_items_stored() {
        let (store, source, feed) = setup(TWO_VALID_ONE_BROKEN);

        let stats = ingest_feed(&store, &source, &feed).await.result.unwrap();
        assert_eq!(
            stats,
            IngestStats {
                items: 3,
                created: 2,
                duplicates: 0,
                skipped: 1,
                failed: 0,
            }
        );
        assert_eq!(
            store.post_links(feed.id),
            vec!["http://x/1".to_string(), "http://x/2".to_string()]
        );
    }

    #[tokio::test]
    async fn test_second_ingest_is_idempotent() {
        let (store, source, feed) = setup(TWO_VALID_ONE_BROKEN);

        ingest_feed(&store, &source, &feed).await.result.unwrap();
        let second = ingest_feed(&store, &source, &feed).await.result.unwrap();

        assert_eq!(second.created, 0);
        assert_eq!(second.duplicates, 2);
        assert_eq!(store.post_links(feed.id).len(), 2);
    }

    #[tokio::test]
    async fn test_mark_failure_skips_fetch() {
        let (store, source, feed) = setup(TWO_VALID_ONE_BROKEN);
        store.fail_mark(feed.id);

        let report = ingest_feed(&store, &source, &feed).await;
        assert!(matches!(report.result, Err(IngestError::MarkFetched(_))));
        assert_eq!(source.fetch_count(), 0);
        assert!(store.post_links(feed.id).is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_still_marks_fetched() {
        let store = MemoryStore::default();
        let feed = store.add_feed("http://x/rss", None);
        let source = StaticSource::default();
        source.set_status("http://x/rss", 503);

        let before = Utc::now().timestamp();
        let report = ingest_feed(&store, &source, &feed).await;

        assert!(matches!(
            report.result,
            Err(IngestError::Fetch(FetchError::HttpStatus(503)))
        ));
        let marked = store.feed(feed.id).last_fetched_at.unwrap();
        assert!(marked >= before);
    }

    #[tokio::test]
    async fn test_malformed_document_stores_nothing() {
        let (store, source, feed) = setup("<rss><channel><item></channel></rss>");

        let report = ingest_feed(&store, &source, &feed).await;
        assert!(matches!(report.result, Err(IngestError::Parse(_))));
        assert!(store.post_links(feed.id).is_empty());
        assert!(store.feed(feed.id).last_fetched_at.is_some());
    }

    #[tokio::test]
    async fn test_store_error_skips_item_and_continues() {
        let (store, source, feed) = setup(TWO_VALID_ONE_BROKEN);
        store.fail_post("http://x/1");

        let stats = ingest_feed(&store, &source, &feed).await.result.unwrap();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.created, 1);
        assert_eq!(store.post_links(feed.id), vec!["http://x/2".to_string()]);
    }

    #[tokio::test]
    async fn test_item_without_link_skipped() {
        let body = r#"<rss><channel>
            <item><title>No link</title><pubDate>Mon, 02 Jan 2006 15:04:05 GMT</pubDate></item>
            <item><link>http://x/2</link><pubDate>Mon, 02 Jan 2006 15:04:05 GMT</pubDate></item>
        </channel></rss>"#;
        let (store, source, feed) = setup(body);

        let stats = ingest_feed(&store, &source, &feed).await.result.unwrap();
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.created, 1);
    }

    #[tokio::test]
    async fn test_post_fields_carried_through() {
        let body = r#"<rss><channel><item>
            <title>Hello</title>
            <link>http://x/1</link>
            <description>World</description>
            <pubDate>Mon, 02 Jan 2006 15:04:05 GMT</pubDate>
        </item></channel></rss>"#;
        let (store, source, feed) = setup(body);

        ingest_feed(&store, &source, &feed).await.result.unwrap();
        let post = store.post(feed.id, "http://x/1").unwrap();
        assert_eq!(post.title, "Hello");
        assert_eq!(post.description.as_deref(), Some("World"));
        assert_eq!(post.published_at.unwrap().timestamp(), 1136214245);
    }
}
