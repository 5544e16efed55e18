//! Shared fakes and seed helpers for the in-crate tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tempfile::TempDir;
use uuid::Uuid;

use crate::ai::Summarizer;
use crate::cache::ResponseCache;
use crate::config::Config;
use crate::context::AppContext;
use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::feed::{FeedItem, FeedParser, ParsedFeed};
use crate::models::{
    Article, Feed, NewArticle, NewFeed, NewPublisher, Plan, Publisher, User,
};
use crate::services::{
    ChatSink, ContentFetcher, FollowRecord, MetadataFetcher, NotificationPayload, PortalApi,
    Subscriber,
};
use crate::text::slugify;

#[derive(Default)]
struct PortalState {
    subscribers: Vec<(String, Subscriber)>,
    follows: HashMap<(i64, String), FollowRecord>,
    notifications: Vec<NotificationPayload>,
}

/// In-memory portal backend recording every notification it is asked to emit.
#[derive(Default)]
pub struct FakePortal {
    state: Mutex<PortalState>,
}

impl FakePortal {
    pub fn add_subscriber(&self, publisher_uuid: &str, user_id: i64) {
        self.state.lock().unwrap().subscribers.push((
            publisher_uuid.to_string(),
            Subscriber {
                uuid: Uuid::new_v4().to_string(),
                user_id,
            },
        ));
    }

    pub fn set_follow(&self, user_id: i64, publisher_uuid: &str, follow: FollowRecord) {
        self.state
            .lock()
            .unwrap()
            .follows
            .insert((user_id, publisher_uuid.to_string()), follow);
    }

    pub fn notifications(&self) -> Vec<NotificationPayload> {
        self.state.lock().unwrap().notifications.clone()
    }
}

#[async_trait]
impl PortalApi for FakePortal {
    async fn retrieve_user(&self, _access_token: &str) -> Result<User> {
        Ok(User {
            id: 1,
            plan: Plan::Free,
        })
    }

    async fn list_subscribers(&self, publisher_uuid: &str) -> Result<Vec<Subscriber>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .subscribers
            .iter()
            .filter(|(uuid, _)| uuid == publisher_uuid)
            .map(|(_, subscriber)| subscriber.clone())
            .collect())
    }

    async fn retrieve_follow(
        &self,
        user_id: i64,
        publisher_uuid: &str,
    ) -> Result<Option<FollowRecord>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .follows
            .get(&(user_id, publisher_uuid.to_string()))
            .cloned())
    }

    async fn create_notification(&self, notification: &NotificationPayload) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .notifications
            .push(notification.clone());
        Ok(())
    }
}

/// Feed parser serving canned feeds by URL; unknown URLs are unreachable.
#[derive(Default)]
pub struct StaticFeedParser {
    feeds: Mutex<HashMap<String, ParsedFeed>>,
}

impl StaticFeedParser {
    pub fn set_feed(&self, url: &str, feed: ParsedFeed) {
        self.feeds.lock().unwrap().insert(url.to_string(), feed);
    }
}

#[async_trait]
impl FeedParser for StaticFeedParser {
    async fn parse(&self, url: &str) -> Result<ParsedFeed> {
        self.feeds
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| AppError::FeedUnreachable(url.to_string()))
    }
}

/// Metadata fetcher with a switchable canned answer.
pub struct StaticMetadataFetcher {
    image: Mutex<Option<String>>,
    fail: Mutex<bool>,
}

impl Default for StaticMetadataFetcher {
    fn default() -> Self {
        Self {
            image: Mutex::new(Some("https://img.example.com/lead.jpg".to_string())),
            fail: Mutex::new(false),
        }
    }
}

impl StaticMetadataFetcher {
    pub fn set_image(&self, image: Option<&str>) {
        *self.image.lock().unwrap() = image.map(str::to_string);
    }

    pub fn set_fail(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }
}

#[async_trait]
impl MetadataFetcher for StaticMetadataFetcher {
    async fn lead_image(&self, url: &str) -> Result<Option<String>> {
        if *self.fail.lock().unwrap() {
            return Err(anyhow::anyhow!("metadata fetch failed for {url}").into());
        }
        Ok(self.image.lock().unwrap().clone())
    }
}

#[derive(Default)]
pub struct FakeChat {
    messages: Mutex<Vec<(String, String)>>,
}

impl FakeChat {
    pub fn messages(&self) -> Vec<(String, String)> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatSink for FakeChat {
    async fn send_message(&self, channel_id: &str, text: &str) -> Result<()> {
        self.messages
            .lock()
            .unwrap()
            .push((channel_id.to_string(), text.to_string()));
        Ok(())
    }
}

/// A context wired up with fakes over a throwaway database, plus handles
/// to the fakes for assertions.
pub struct TestHarness {
    pub dir: TempDir,
    pub ctx: AppContext,
    pub portal: Arc<FakePortal>,
    pub parser: Arc<StaticFeedParser>,
    pub metadata: Arc<StaticMetadataFetcher>,
    pub chat: Arc<FakeChat>,
}

pub async fn harness() -> TestHarness {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("test.db");

    let mut config = Config::default();
    config.db_path = db_path.to_string_lossy().to_string();

    let repo = Repository::new(&config.db_path).await.unwrap();
    let portal = Arc::new(FakePortal::default());
    let parser = Arc::new(StaticFeedParser::default());
    let metadata = Arc::new(StaticMetadataFetcher::default());
    let chat = Arc::new(FakeChat::default());

    let ctx = AppContext {
        config,
        repo,
        cache: ResponseCache::new(),
        parser: parser.clone(),
        metadata: metadata.clone(),
        portal: portal.clone(),
        chat: Some(chat.clone()),
        content: ContentFetcher::new(),
        summarizer: None::<Summarizer>,
    };

    TestHarness {
        dir,
        ctx,
        portal,
        parser,
        metadata,
        chat,
    }
}

pub async fn seed_publisher(ctx: &AppContext, name: &str) -> Publisher {
    ctx.repo
        .create_publisher(NewPublisher {
            name: name.to_string(),
            description: "A test publisher".to_string(),
            url: "https://example.com".to_string(),
            logo_url: "https://example.com/logo.png".to_string(),
        })
        .await
        .unwrap()
}

pub async fn seed_feed(ctx: &AppContext, publisher_id: i64, url: &str) -> Feed {
    ctx.repo
        .create_feed(NewFeed {
            publisher_id,
            url: url.to_string(),
            name: Some("Test feed".to_string()),
            language: Some("en".to_string()),
            channel_id: None,
        })
        .await
        .unwrap()
}

pub async fn seed_publisher_and_feed(
    ctx: &AppContext,
    name: &str,
    feed_url: &str,
) -> (Publisher, Feed) {
    let publisher = seed_publisher(ctx, name).await;
    let feed = seed_feed(ctx, publisher.id, feed_url).await;
    (publisher, feed)
}

pub async fn seed_article(ctx: &AppContext, feed: &Feed, url: &str, title: &str) -> Article {
    let uuid = Uuid::new_v4().to_string();
    ctx.repo
        .create_article(
            NewArticle {
                slug: format!("{}-{}", slugify(title), uuid),
                uuid,
                url: url.to_string(),
                title: title.to_string(),
                description: Some("A short description".to_string()),
                date: Utc::now(),
                image_url: None,
                content: None,
            },
            feed.id,
        )
        .await
        .unwrap()
        .unwrap()
}

pub fn feed_item(link: &str, title: &str) -> FeedItem {
    FeedItem {
        guid: Some(link.to_string()),
        link: link.to_string(),
        title: title.to_string(),
        snippet: Some(format!("{title} summary")),
        content: Some(format!("<p>{title} content</p>")),
        published: Some(Utc::now()),
    }
}

pub fn parsed_feed(items: Vec<FeedItem>) -> ParsedFeed {
    ParsedFeed {
        name: Some("Test feed".to_string()),
        description: None,
        language: Some("en".to_string()),
        items,
    }
}
