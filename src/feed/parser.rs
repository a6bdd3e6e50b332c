use rss::Channel;
use thiserror::Error;

/// The document could not be decoded as an RSS channel.
///
/// Parsing is all-or-nothing: a malformed document never yields a partial
/// item list.
#[derive(Debug, Error)]
#[error("Invalid feed document: {0}")]
pub struct ParseError(#[from] rss::Error);

/// A single `<item>` of an RSS channel, fields as they appear in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub description: Option<String>,
    /// Raw `pubDate` text; normalized later by [`parse_pub_date`](super::parse_pub_date)
    pub pub_date: String,
}

#[derive(Debug, Clone)]
pub struct ParsedFeed {
    pub title: String,
    /// Items in document order
    pub items: Vec<FeedItem>,
}

impl From<&rss::Item> for FeedItem {
    fn from(item: &rss::Item) -> Self {
        FeedItem {
            title: item.title().unwrap_or_default().to_string(),
            link: item.link().unwrap_or_default().trim().to_string(),
            description: item
                .description()
                .filter(|d| !d.trim().is_empty())
                .map(str::to_string),
            pub_date: item.pub_date().unwrap_or_default().to_string(),
        }
    }
}

/// Decode raw RSS 2.0 bytes into the channel title and its items.
///
/// Namespaced extension elements (`itunes:*`, `media:*`, `atom:link`, ...)
/// are kept apart from the core fields, and markup nested inside a text
/// field is skipped rather than treated as an error.
pub fn parse_feed(bytes: &[u8]) -> Result<ParsedFeed, ParseError> {
    let channel = Channel::read_from(bytes)?;

    Ok(ParsedFeed {
        title: channel.title().to_string(),
        items: channel.items().iter().map(FeedItem::from).collect(),
    })
}
