//! The ingestion pipeline: crawl every feed, deduplicate against the store,
//! create new articles, fan out notifications, refresh feed-scoped caches.

use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::watch;
use uuid::Uuid;

use crate::cache;
use crate::context::AppContext;
use crate::error::Result;
use crate::feed::FeedItem;
use crate::models::{ArticleQuery, Feed, NewArticle};
use crate::notify;
use crate::text::slugify;

#[derive(Debug, Default, Clone, Copy)]
pub struct CycleSummary {
    pub new_articles: u64,
    pub refreshed_caches: u64,
}

/// One complete pass over every feed in the store.
///
/// Feeds are processed strictly one at a time, items within a feed one at a
/// time: creation must be sequential with respect to the duplicate-URL check,
/// and the store's unique constraint catches whatever still races. A failing
/// feed never takes the cycle down with it.
pub async fn run_cycle(ctx: &AppContext) -> Result<CycleSummary> {
    let feeds = ctx.repo.get_all_feeds().await?;
    let mut new_articles = 0;

    for feed in &feeds {
        let parsed = match ctx.parser.parse(&feed.url).await {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("skipping feed {}: {}", feed.url, e);
                continue;
            }
        };

        for item in parsed.items {
            match ingest_item(ctx, feed, &item).await {
                Ok(true) => new_articles += 1,
                Ok(false) => {}
                Err(e) => tracing::error!("failed to ingest {}: {}", item.link, e),
            }
        }
    }

    let refreshed_caches = refresh_feed_caches(ctx).await?;

    Ok(CycleSummary {
        new_articles,
        refreshed_caches,
    })
}

/// Returns true when a new article was created.
async fn ingest_item(ctx: &AppContext, feed: &Feed, item: &FeedItem) -> Result<bool> {
    if let Some(existing) = ctx.repo.find_article_by_url(&item.link).await? {
        // Known article surfaced by another feed: record the association.
        let feed_ids = ctx.repo.article_feed_ids(existing.id).await?;
        if !feed_ids.contains(&feed.id) {
            ctx.repo.attach_article_to_feed(existing.id, feed.id).await?;
        }
        return Ok(false);
    }

    // A page we cannot inspect yields no article at all; the item is
    // retried on the next cycle.
    let image_url = match ctx.metadata.lead_image(&item.link).await {
        Ok(image) => image,
        Err(e) => {
            tracing::warn!("skipping {}: {}", item.link, e);
            return Ok(false);
        }
    };

    let uuid = Uuid::new_v4().to_string();
    let article = NewArticle {
        slug: format!("{}-{}", slugify(&item.title), uuid),
        uuid,
        url: item.link.clone(),
        title: item.title.clone(),
        description: item.snippet.clone(),
        date: item.published.unwrap_or_else(Utc::now),
        image_url,
        content: item.content.as_ref().map(|c| c.trim().to_string()),
    };

    let Some(created) = ctx.repo.create_article(article, feed.id).await? else {
        // Lost the duplicate-URL race; the article exists, nothing to do.
        return Ok(false);
    };

    // Creation is durable at this point. A failed fan-out costs at most the
    // notification, never a notification for a nonexistent article.
    if let Err(e) = notify::dispatch_for_article(ctx, &created, feed).await {
        tracing::error!("notification fan-out failed for {}: {}", created.slug, e);
    }

    Ok(true)
}

/// Re-executes every live feed-scoped cache entry with its stored arguments
/// and overwrites the value in place, leaving the remaining TTL untouched.
pub async fn refresh_feed_caches(ctx: &AppContext) -> Result<u64> {
    let mut refreshed = 0;

    for key in ctx.cache.feed_keys().await {
        let Some(json) = key.strip_prefix(cache::FEED_KEY_PREFIX) else {
            continue;
        };

        let args: ArticleQuery = match serde_json::from_str(json) {
            Ok(args) => args,
            Err(e) => {
                tracing::warn!("ignoring unreadable feed cache key {}: {}", key, e);
                continue;
            }
        };

        let result = ctx.repo.count_and_list_articles(args).await?;
        if ctx.cache.replace(&key, &result).await? {
            refreshed += 1;
        }
    }

    Ok(refreshed)
}

/// Fixed-interval driver around `run_cycle`.
///
/// Single-flight: a cycle runs to completion, including all per-feed and
/// per-article work, before the next sleep starts. The shutdown channel
/// stops the loop between cycles; there is no mid-cycle cancellation.
pub struct Scheduler {
    interval: Duration,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub async fn run(&self, ctx: &AppContext, mut shutdown: watch::Receiver<bool>) {
        loop {
            let started = Instant::now();
            tracing::info!("starting ingestion cycle");

            match run_cycle(ctx).await {
                Ok(summary) => tracing::info!(
                    new_articles = summary.new_articles,
                    refreshed_caches = summary.refreshed_caches,
                    elapsed_secs = started.elapsed().as_secs(),
                    "ingestion cycle finished"
                ),
                Err(e) => tracing::error!("ingestion cycle failed: {}", e),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    // A dropped sender also means nobody wants more cycles.
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("scheduler stopping");
                        return;
                    }
                }
            }
        }
    }
}
