use std::sync::Arc;

use crate::ai::Summarizer;
use crate::cache::ResponseCache;
use crate::config::Config;
use crate::db::Repository;
use crate::error::Result;
use crate::feed::{FeedParser, HttpFeedParser};
use crate::services::{
    ChatClient, ChatSink, ContentFetcher, HttpMetadataFetcher, MetadataFetcher, PortalApi,
    PortalClient,
};

/// Explicitly constructed bundle of shared handles, passed into every
/// operation that needs one. Nothing in the crate reaches for globals.
pub struct AppContext {
    pub config: Config,
    pub repo: Repository,
    pub cache: ResponseCache,
    pub parser: Arc<dyn FeedParser>,
    pub metadata: Arc<dyn MetadataFetcher>,
    pub portal: Arc<dyn PortalApi>,
    pub chat: Option<Arc<dyn ChatSink>>,
    pub content: ContentFetcher,
    pub summarizer: Option<Summarizer>,
}

impl AppContext {
    pub async fn new(config: Config) -> Result<Self> {
        let repo = Repository::new(&config.db_path).await?;
        let portal = Arc::new(PortalClient::new(config.portal_base_url()));

        let chat = config
            .chat_bot_token
            .as_ref()
            .map(|token| Arc::new(ChatClient::new(token.clone())) as Arc<dyn ChatSink>);

        let summarizer = config
            .claude_api_key
            .as_ref()
            .map(|key| Summarizer::new(key.clone()));

        Ok(Self {
            repo,
            cache: ResponseCache::new(),
            parser: Arc::new(HttpFeedParser::new()),
            metadata: Arc::new(HttpMetadataFetcher::new()),
            portal,
            chat,
            content: ContentFetcher::new(),
            summarizer,
            config,
        })
    }
}
