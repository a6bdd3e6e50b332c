//! Periodic feed ingestion.
//!
//! The [`Scheduler`] fires on a fixed interval, asks the [`FeedStore`] for the
//! `K` stalest feeds, and runs one [`ingest_feed`] worker per feed with at most
//! `K` in flight. The tick ends only when every worker has reported back.
//!
//! Failures are contained where they happen:
//!
//! - batch selection fails: the tick is skipped
//! - mark-fetched, fetch or parse fails: that feed is abandoned until a later tick
//! - an item has a bad date or the store rejects it: that item is skipped
//! - an item is already stored: counted as a duplicate, not an error
//!
//! Duplicate suppression lives entirely in the [`PostStore`]'s (feed, link)
//! uniqueness, so workers share the stores without any in-process locking.

mod scheduler;
mod store;
#[cfg(test)]
mod testing;
mod worker;

pub use scheduler::{
    ScheduleError, Scheduler, SchedulerConfig, SchedulerExit, SchedulerHandle, TickReport,
};
pub use store::{FeedSource, FeedStore, PostStore};
pub use worker::{ingest_feed, FeedReport, IngestError, IngestStats};
