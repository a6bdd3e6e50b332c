//! Feed retrieval and decoding.
//!
//! - [`fetcher`] - HTTP retrieval with a fixed timeout and body size cap
//! - [`parser`] - RSS 2.0 `channel/item` decoding via the `rss` crate
//! - [`dates`] - best-effort normalization of `pubDate` text to UTC
//!
//! # Example
//!
//! ```ignore
//! use gleaner::feed::{parse_feed, parse_pub_date, HttpFetcher, DEFAULT_REQUEST_TIMEOUT};
//! use gleaner::ingest::FeedSource;
//!
//! let fetcher = HttpFetcher::new(DEFAULT_REQUEST_TIMEOUT)?;
//! let bytes = fetcher.fetch_bytes("https://example.com/rss").await?;
//! for item in parse_feed(&bytes)?.items {
//!     let published = parse_pub_date(&item.pub_date)?;
//! }
//! ```

mod dates;
mod fetcher;
mod parser;

pub use dates::{parse_pub_date, DateParseError};
pub use fetcher::{FetchError, HttpFetcher, DEFAULT_REQUEST_TIMEOUT};
pub use parser::{parse_feed, FeedItem, ParseError, ParsedFeed};
