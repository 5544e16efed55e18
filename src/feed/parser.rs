use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feed_rs::parser;
use reqwest::Client;

use crate::error::{AppError, Result};

/// One entry of a parsed syndication feed.
#[derive(Debug, Clone)]
pub struct FeedItem {
    pub guid: Option<String>,
    pub link: String,
    pub title: String,
    /// Short plain-ish summary, used as the article description.
    pub snippet: Option<String>,
    /// Raw entry content as published.
    pub content: Option<String>,
    pub published: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ParsedFeed {
    pub name: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
    pub items: Vec<FeedItem>,
}

/// Parses a syndication endpoint into a normalized item sequence.
///
/// Implementations fail with `FeedUnreachable` or `FeedParse`; callers treat
/// both as per-feed failures and move on to the next feed.
#[async_trait]
pub trait FeedParser: Send + Sync {
    async fn parse(&self, url: &str) -> Result<ParsedFeed>;
}

pub struct HttpFeedParser {
    client: Client,
}

impl HttpFeedParser {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("newswire/1.0")
            .build()
            .expect("Failed to create HTTP client");

        Self { client }
    }

    fn parse_bytes(url: &str, bytes: &[u8]) -> Result<ParsedFeed> {
        let feed = parser::parse(bytes).map_err(|e| AppError::FeedParse {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let items = feed
            .entries
            .into_iter()
            .filter_map(|entry| {
                // Entries without a link cannot be deduplicated, skip them.
                let link = entry.links.first().map(|l| l.href.clone())?;
                let link = resolve_url(&link, url);

                let snippet = entry.summary.as_ref().map(|s| s.content.clone());
                let content = entry
                    .content
                    .and_then(|c| c.body)
                    .or_else(|| snippet.clone());

                Some(FeedItem {
                    guid: if entry.id.is_empty() {
                        None
                    } else {
                        Some(entry.id)
                    },
                    link,
                    title: entry
                        .title
                        .map(|t| t.content)
                        .unwrap_or_else(|| "Untitled".to_string()),
                    snippet,
                    content,
                    published: entry.published.or(entry.updated),
                })
            })
            .collect();

        Ok(ParsedFeed {
            name: feed.title.map(|t| t.content),
            description: feed.description.map(|d| d.content),
            language: feed.language.map(|l| l.to_lowercase()),
            items,
        })
    }
}

#[async_trait]
impl FeedParser for HttpFeedParser {
    async fn parse(&self, url: &str) -> Result<ParsedFeed> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::FeedUnreachable(format!("{url}: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::FeedUnreachable(format!(
                "{url}: HTTP {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::FeedUnreachable(format!("{url}: {e}")))?;

        Self::parse_bytes(url, &bytes)
    }
}

impl Default for HttpFeedParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve a potentially relative entry link against the feed URL.
fn resolve_url(href: &str, base_url: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }

    if let Ok(base) = url::Url::parse(base_url) {
        if let Ok(resolved) = base.join(href) {
            return resolved.to_string();
        }
    }

    href.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Example News</title>
    <description>News from Example</description>
    <language>en-US</language>
    <item>
      <guid>item-1</guid>
      <title>First story</title>
      <link>https://example.com/first</link>
      <description>A short summary</description>
      <pubDate>Mon, 06 Jan 2025 10:00:00 GMT</pubDate>
    </item>
    <item>
      <title>No link here</title>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_items_and_skips_linkless_entries() {
        let parsed =
            HttpFeedParser::parse_bytes("https://example.com/feed", SAMPLE_RSS.as_bytes())
                .unwrap();

        assert_eq!(parsed.name.as_deref(), Some("Example News"));
        assert_eq!(parsed.language.as_deref(), Some("en-us"));
        assert_eq!(parsed.items.len(), 1);

        let item = &parsed.items[0];
        assert_eq!(item.link, "https://example.com/first");
        assert_eq!(item.title, "First story");
        assert_eq!(item.snippet.as_deref(), Some("A short summary"));
        assert!(item.published.is_some());
    }

    #[test]
    fn relative_entry_links_resolve_against_the_feed_url() {
        let rss = r#"<?xml version="1.0"?><rss version="2.0"><channel>
            <title>T</title>
            <item><title>Rel</title><link>/stories/42</link></item>
        </channel></rss>"#;

        let parsed =
            HttpFeedParser::parse_bytes("https://example.com/feed.xml", rss.as_bytes()).unwrap();
        assert_eq!(parsed.items[0].link, "https://example.com/stories/42");
    }

    #[test]
    fn malformed_input_is_a_parse_error() {
        let err = HttpFeedParser::parse_bytes("https://example.com/feed", b"not xml at all")
            .unwrap_err();
        assert!(matches!(err, AppError::FeedParse { .. }));
    }
}
