//! Periodic RSS ingestion into a deduplicated post store.
//!
//! - [`ingest`] - scheduler, per-feed workers, and the store/source traits they consume
//! - [`feed`] - HTTP fetching, RSS decoding, `pubDate` normalization
//! - [`storage`] - SQLite implementation of the feed and post stores
//! - [`config`] - TOML configuration

pub mod config;
pub mod feed;
pub mod ingest;
pub mod storage;
pub mod util;
