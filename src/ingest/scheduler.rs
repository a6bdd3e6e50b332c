use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;

use super::store::{FeedSource, FeedStore, PostStore};
use super::worker::{ingest_feed, FeedReport};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Fetch interval must be greater than zero")]
    ZeroInterval,
    #[error("Batch size must be greater than zero")]
    ZeroBatchSize,
}

/// Tick cadence and per-tick fan-out, fixed for the scheduler's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    interval: Duration,
    batch_size: usize,
}

impl SchedulerConfig {
    pub fn new(interval: Duration, batch_size: usize) -> Result<Self, ScheduleError> {
        if interval.is_zero() {
            return Err(ScheduleError::ZeroInterval);
        }
        if batch_size == 0 {
            return Err(ScheduleError::ZeroBatchSize);
        }
        Ok(Self {
            interval,
            batch_size,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

/// Result of one scheduling cycle.
#[derive(Debug)]
pub struct TickReport {
    pub started_at: DateTime<Utc>,
    /// Batch selection failed; nothing was dispatched
    pub skipped: bool,
    /// One entry per dispatched feed, in completion order
    pub reports: Vec<FeedReport>,
}

impl TickReport {
    fn selection_failed(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            skipped: true,
            reports: Vec::new(),
        }
    }

    pub fn dispatched(&self) -> usize {
        self.reports.len()
    }

    pub fn succeeded(&self) -> usize {
        self.reports.iter().filter(|r| r.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.dispatched() - self.succeeded()
    }

    pub fn posts_created(&self) -> usize {
        self.reports
            .iter()
            .filter_map(|r| r.result.as_ref().ok())
            .map(|s| s.created)
            .sum()
    }
}

/// Periodic driver of the ingestion pipeline.
///
/// Each tick selects up to `batch_size` stale feeds, runs one worker per feed
/// concurrently, and waits for every worker before the next tick may start.
pub struct Scheduler<S: ?Sized, F: ?Sized> {
    store: Arc<S>,
    source: Arc<F>,
    config: SchedulerConfig,
}

impl<S, F> Scheduler<S, F>
where
    S: FeedStore + PostStore + ?Sized + 'static,
    F: FeedSource + ?Sized + 'static,
{
    pub fn new(store: Arc<S>, source: Arc<F>, config: SchedulerConfig) -> Self {
        Self {
            store,
            source,
            config,
        }
    }

    pub fn config(&self) -> SchedulerConfig {
        self.config
    }

    /// Run a single scheduling cycle to completion.
    ///
    /// Selection failure skips the tick. Worker failures are contained in
    /// their [`FeedReport`]; this never fails as a whole.
    pub async fn run_tick(&self) -> TickReport {
        let started_at = Utc::now();

        let mut feeds = match self
            .store
            .select_feeds_to_fetch(self.config.batch_size)
            .await
        {
            Ok(feeds) => feeds,
            Err(e) => {
                tracing::error!(error = %e, "Couldn't get next feeds to fetch, skipping tick");
                return TickReport::selection_failed(started_at);
            }
        };
        // Never dispatch more than K workers, whatever the store returned
        feeds.truncate(self.config.batch_size);

        tracing::info!(feeds = feeds.len(), "Found feeds to fetch");

        let reports: Vec<FeedReport> = stream::iter(feeds)
            .map(|feed| {
                let store = Arc::clone(&self.store);
                let source = Arc::clone(&self.source);
                async move { ingest_feed(&*store, &*source, &feed).await }
            })
            .buffer_unordered(self.config.batch_size)
            .collect()
            .await;

        let report = TickReport {
            started_at,
            skipped: false,
            reports,
        };

        tracing::info!(
            dispatched = report.dispatched(),
            succeeded = report.succeeded(),
            failed = report.failed(),
            posts_created = report.posts_created(),
            elapsed_ms = (Utc::now() - started_at).num_milliseconds(),
            "Tick complete"
        );

        report
    }

    /// Tick until `shutdown` flips to `true` or its sender is dropped.
    ///
    /// The first tick fires immediately. Shutdown is only observed between
    /// ticks: an in-flight batch always runs to completion. A batch that
    /// outlasts the interval delays the next tick rather than bunching ticks.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            interval_secs = self.config.interval.as_secs_f64(),
            batch_size = self.config.batch_size,
            "Collecting feeds"
        );

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            self.run_tick().await;
        }

        tracing::info!("Scheduler stopped");
    }

    /// Start [`run`](Self::run) on the tokio runtime.
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(self.run(shutdown_rx));
        SchedulerHandle { shutdown_tx, join }
    }
}

/// Owner of a running scheduler task.
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Request shutdown and wait for the current batch (if any) to finish.
    pub async fn stop(self) -> Result<(), JoinError> {
        // Receiver is gone only if the task already exited
        let _ = self.shutdown_tx.send(true);
        self.join.await
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Keep the scheduler running until `signal` resolves, then stop it.
    ///
    /// Returns [`SchedulerExit::Exited`] without waiting for `signal` if the
    /// task ends on its own, and the `JoinError` if it panicked.
    pub async fn run_until<F: Future>(mut self, signal: F) -> Result<SchedulerExit, JoinError> {
        tokio::select! {
            result = &mut self.join => {
                result?;
                tracing::warn!("Scheduler task ended without a stop request");
                return Ok(SchedulerExit::Exited);
            }
            _ = signal => {}
        }
        self.stop().await?;
        Ok(SchedulerExit::Stopped)
    }
}

/// How [`SchedulerHandle::run_until`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerExit {
    /// The signal fired and the scheduler shut down after its current batch
    Stopped,
    /// The task finished before any stop request
    Exited,
}
