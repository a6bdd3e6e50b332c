//! In-memory stores and sources for exercising the pipeline without SQLite or HTTP.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use super::store::{FeedSource, FeedStore, PostStore};
use crate::feed::FetchError;
use crate::storage::{DatabaseError, Feed, InsertOutcome, NewPost};

#[derive(Default)]
struct MemoryState {
    feeds: Vec<Feed>,
    posts: Vec<NewPost>,
    fail_select: bool,
    fail_mark: HashSet<i64>,
    fail_posts: HashSet<String>,
}

#[derive(Default)]
pub(crate) struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub(crate) fn add_feed(&self, url: &str, last_fetched_at: Option<i64>) -> Feed {
        let mut state = self.state.lock().unwrap();
        let feed = Feed {
            id: state.feeds.len() as i64 + 1,
            name: Arc::from(url),
            url: url.to_string(),
            owner_id: "owner".to_string(),
            created_at: 0,
            last_fetched_at,
        };
        state.feeds.push(feed.clone());
        feed
    }

    pub(crate) fn feed(&self, feed_id: i64) -> Feed {
        let state = self.state.lock().unwrap();
        state.feeds.iter().find(|f| f.id == feed_id).cloned().unwrap()
    }

    /// Stored links for a feed in insertion order
    pub(crate) fn post_links(&self, feed_id: i64) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .posts
            .iter()
            .filter(|p| p.feed_id == feed_id)
            .map(|p| p.url.clone())
            .collect()
    }

    pub(crate) fn post(&self, feed_id: i64, url: &str) -> Option<NewPost> {
        let state = self.state.lock().unwrap();
        state
            .posts
            .iter()
            .find(|p| p.feed_id == feed_id && p.url == url)
            .cloned()
    }

    pub(crate) fn fail_select(&self, fail: bool) {
        self.state.lock().unwrap().fail_select = fail;
    }

    pub(crate) fn fail_mark(&self, feed_id: i64) {
        self.state.lock().unwrap().fail_mark.insert(feed_id);
    }

    pub(crate) fn fail_post(&self, url: &str) {
        self.state.lock().unwrap().fail_posts.insert(url.to_string());
    }
}

#[async_trait]
impl FeedStore for MemoryStore {
    async fn select_feeds_to_fetch(&self, limit: usize) -> Result<Vec<Feed>, DatabaseError> {
        let state = self.state.lock().unwrap();
        if state.fail_select {
            return Err(DatabaseError::Locked);
        }
        let mut feeds = state.feeds.clone();
        feeds.sort_by_key(|f| (f.last_fetched_at.is_some(), f.last_fetched_at, f.id));
        feeds.truncate(limit);
        Ok(feeds)
    }

    async fn mark_feed_fetched(
        &self,
        feed_id: i64,
        at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_mark.contains(&feed_id) {
            return Err(DatabaseError::Locked);
        }
        let feed = state
            .feeds
            .iter_mut()
            .find(|f| f.id == feed_id)
            .ok_or(DatabaseError::NotFound(feed_id))?;
        let at = at.timestamp();
        feed.last_fetched_at = Some(feed.last_fetched_at.map_or(at, |prev| prev.max(at)));
        Ok(())
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn create_post_if_absent(&self, post: &NewPost) -> Result<InsertOutcome, DatabaseError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_posts.contains(&post.url) {
            return Err(DatabaseError::Locked);
        }
        if state
            .posts
            .iter()
            .any(|p| p.feed_id == post.feed_id && p.url == post.url)
        {
            return Ok(InsertOutcome::Duplicate);
        }
        state.posts.push(post.clone());
        Ok(InsertOutcome::Created)
    }
}

#[derive(Clone)]
enum Canned {
    Body(Vec<u8>),
    Status(u16),
    Panic,
}

/// A completed fetch with its (paused-clock) start and end instants.
#[derive(Debug, Clone)]
pub(crate) struct FetchRecord {
    pub url: String,
    pub started: Instant,
    pub finished: Instant,
}

/// Canned responses keyed by URL; unknown URLs answer 404.
#[derive(Default)]
pub(crate) struct StaticSource {
    responses: Mutex<HashMap<String, Canned>>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    fetches: Mutex<Vec<FetchRecord>>,
}

impl StaticSource {
    pub(crate) fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub(crate) fn set_body(&self, url: &str, body: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), Canned::Body(body.as_bytes().to_vec()));
    }

    pub(crate) fn set_status(&self, url: &str, status: u16) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), Canned::Status(status));
    }

    /// Make fetches of `url` panic, as a bug inside a worker would.
    pub(crate) fn set_panic(&self, url: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), Canned::Panic);
    }

    pub(crate) fn fetch_count(&self) -> usize {
        self.fetches.lock().unwrap().len()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn fetches(&self) -> Vec<FetchRecord> {
        self.fetches.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeedSource for StaticSource {
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let started = Instant::now();

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let canned = self.responses.lock().unwrap().get(url).cloned();
        let result = match canned {
            Some(Canned::Body(body)) => Ok(body),
            Some(Canned::Status(status)) => Err(FetchError::HttpStatus(status)),
            Some(Canned::Panic) => panic!("fetch of {} panicked", url),
            None => Err(FetchError::HttpStatus(404)),
        };

        self.fetches.lock().unwrap().push(FetchRecord {
            url: url.to_string(),
            started,
            finished: Instant::now(),
        });
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
