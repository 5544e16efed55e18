use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Organizational owner of one or more feeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Publisher {
    pub id: i64,
    pub uuid: String,
    pub name: String,
    pub description: String,
    pub url: String,
    pub logo_url: String,
}

/// A syndication source belonging to a publisher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feed {
    pub id: i64,
    pub uuid: String,
    pub publisher_id: i64,
    pub url: String,
    pub name: Option<String>,
    pub language: Option<String>,
    /// Chat channel that receives a message for every new article.
    pub channel_id: Option<String>,
}

/// A deduplicated content item, keyed by its canonical source URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub uuid: String,
    pub slug: String,
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub date: DateTime<Utc>,
    pub image_url: Option<String>,
    pub content: Option<String>,
    /// Generated once, then persisted permanently.
    pub summary: Option<String>,
}

/// Paged listing result: total count and page taken from one snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleList {
    pub total: i64,
    pub items: Vec<Article>,
}

#[derive(Debug, Clone)]
pub struct NewPublisher {
    pub name: String,
    pub description: String,
    pub url: String,
    pub logo_url: String,
}

/// Administrator-issued partial update; `None` fields keep their value.
#[derive(Debug, Clone, Default)]
pub struct PublisherUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub logo_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewFeed {
    pub publisher_id: i64,
    pub url: String,
    pub name: Option<String>,
    pub language: Option<String>,
    pub channel_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewArticle {
    pub uuid: String,
    pub slug: String,
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub date: DateTime<Utc>,
    pub image_url: Option<String>,
    pub content: Option<String>,
}

/// Arguments accepted by the article listing queries.
///
/// Field order matters: the feed-scoped cache key is the serialized form
/// of this struct, so reordering fields changes every cache key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArticleQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publishers: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_feeds: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Plus,
    Pro,
}

impl Plan {
    pub fn from_i64(value: i64) -> Self {
        match value {
            1 => Plan::Plus,
            2 => Plan::Pro,
            _ => Plan::Free,
        }
    }
}

/// User record resolved through the identity service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub plan: Plan,
}

impl User {
    pub fn is_paid(&self) -> bool {
        self.plan != Plan::Free
    }
}
