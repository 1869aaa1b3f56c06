use crate::feed::FetchError;
use chrono::{DateTime, Utc};
use feed_rs::model::Link;
use feed_rs::parser;
use serde::Serialize;

/// A single feed item, reduced to what is needed to publish it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedEntry {
    pub title: Option<String>,
    /// Identity of the entry; its fingerprint is what the cache remembers
    pub link: String,
    pub published: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct ParseResult {
    /// Entries in document order
    pub entries: Vec<FeedEntry>,
    /// Items dropped because they carried no link
    pub skipped: usize,
}

/// Parses RSS, Atom or JSON Feed bytes into entries.
pub fn parse_feed(bytes: &[u8]) -> Result<ParseResult, FetchError> {
    let feed = parser::parse(bytes).map_err(|e| FetchError::Parse(e.to_string()))?;

    let mut result = ParseResult::default();
    for entry in feed.entries {
        let Some(link) = select_link(&entry.links) else {
            result.skipped += 1;
            continue;
        };

        let title = entry
            .title
            .map(|t| t.content.trim().to_string())
            .filter(|t| !t.is_empty());
        let published = entry.published.or(entry.updated);

        result.entries.push(FeedEntry {
            title,
            link,
            published,
        });
    }

    Ok(result)
}

/// Prefers the entry's alternate (or rel-less) link, falling back to the first one.
fn select_link(links: &[Link]) -> Option<String> {
    links
        .iter()
        .find(|l| l.rel.as_deref().map_or(true, |rel| rel == "alternate"))
        .or_else(|| links.first())
        .map(|l| l.href.trim().to_string())
        .filter(|href| !href.is_empty())
}
