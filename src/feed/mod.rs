//! Feed retrieval and parsing.
//!
//! - [`parser`] - converts RSS/Atom/JSON Feed documents into [`FeedEntry`] values using `feed-rs`
//! - [`fetcher`] - the [`FeedSource`] capability and its default HTTP/filesystem backend
//!
//! # Example
//!
//! ```ignore
//! use feedtoot::feed::{FeedSource, HttpFeedSource};
//!
//! let source = HttpFeedSource::new(reqwest::Client::new());
//! let entries = source.fetch("https://example.com/feed.xml").await?;
//! ```

mod fetcher;
mod parser;

pub use fetcher::{FeedSource, FetchError, HttpFeedSource};
pub use parser::{parse_feed, FeedEntry, ParseResult};
