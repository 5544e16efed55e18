mod parser;

pub use parser::{FeedItem, FeedParser, HttpFeedParser, ParsedFeed};
