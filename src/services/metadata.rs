use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;

use crate::error::{AppError, Result};

/// Looks up a representative image for an article URL.
///
/// `Err` means the page could not be fetched at all; `Ok(None)` means the
/// page carries no usable image. Callers decide what either case means for
/// the article.
#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    async fn lead_image(&self, url: &str) -> Result<Option<String>>;
}

pub struct HttpMetadataFetcher {
    client: Client,
}

impl HttpMetadataFetcher {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("newswire/1.0")
            .build()
            .expect("Failed to create HTTP client");

        Self { client }
    }

    /// Search the page head for an og:image meta tag.
    fn extract_image(html: &str) -> Option<String> {
        let re = Regex::new(
            r#"<meta[^>]*property=["']og:image["'][^>]*content=["']([^"']+)["']"#,
        )
        .ok()?;

        // Also try reverse attribute order (content before property)
        let re2 = Regex::new(
            r#"<meta[^>]*content=["']([^"']+)["'][^>]*property=["']og:image["']"#,
        )
        .ok()?;

        re.captures(html)
            .or_else(|| re2.captures(html))
            .and_then(|cap| cap.get(1))
            .map(|m| m.as_str().to_string())
    }
}

#[async_trait]
impl MetadataFetcher for HttpMetadataFetcher {
    async fn lead_image(&self, url: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(AppError::from)?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "metadata fetch failed for {url}: HTTP {}",
                response.status()
            )
            .into());
        }

        let html = response.text().await?;
        Ok(Self::extract_image(&html))
    }
}

impl Default for HttpMetadataFetcher {
    fn default() -> Self {
        Self::new()
    }
}
