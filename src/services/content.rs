use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Client;

use crate::error::Result;

const USER_AGENT_STRING: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Fetches an article page and extracts its readable text.
pub struct ContentFetcher {
    client: Client,
}

impl ContentFetcher {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");
        Self { client }
    }

    /// Fetch the article page and return its readable text, or `None` when
    /// the page is unreachable or yields nothing worth showing.
    pub async fn fetch_readable(&self, article_url: &str) -> Result<Option<String>> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_STRING));

        let response = match self.client.get(article_url).headers(headers).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!("Failed to fetch {}: {}", article_url, e);
                return Ok(None);
            }
        };

        if !response.status().is_success() {
            tracing::debug!("Failed to fetch {}: {}", article_url, response.status());
            return Ok(None);
        }

        let html = response.text().await?;
        Ok(Self::extract_content(&html))
    }

    /// Extract readable content from HTML using html2text.
    fn extract_content(html: &str) -> Option<String> {
        let text = match html2text::from_read(html.as_bytes(), 80) {
            Ok(t) => t,
            Err(e) => {
                tracing::debug!("Failed to convert HTML to text: {}", e);
                return None;
            }
        };

        // Clean up the text - remove excessive whitespace
        let cleaned: String = text
            .lines()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        if cleaned.len() > 200 {
            Some(cleaned)
        } else {
            tracing::debug!("Extracted content too short ({} chars)", cleaned.len());
            None
        }
    }
}

impl Default for ContentFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_pages_are_rejected() {
        assert_eq!(ContentFetcher::extract_content("<p>tiny</p>"), None);
    }

    #[test]
    fn long_pages_are_cleaned() {
        let body = format!("<html><body><p>{}</p></body></html>", "word ".repeat(100));
        let extracted = ContentFetcher::extract_content(&body).unwrap();
        assert!(extracted.len() > 200);
        assert!(!extracted.contains('<'));
    }
}
