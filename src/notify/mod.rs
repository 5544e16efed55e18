//! Notification fan-out for newly ingested articles.

use chrono::Utc;

use crate::context::AppContext;
use crate::error::Result;
use crate::models::{Article, Feed, Publisher};
use crate::services::{NotificationPayload, APP_ID};
use crate::text::truncate;

const TITLE_LIMIT: usize = 40;
const BODY_LIMIT: usize = 150;

/// Fans a freshly created article out to every subscriber of the feed's
/// publisher, honoring per-user feed exclusions, and posts to the feed's
/// chat channel when one is linked.
///
/// Failures for a single subscriber are logged and the rest keep going.
pub async fn dispatch_for_article(ctx: &AppContext, article: &Article, feed: &Feed) -> Result<()> {
    let Some(publisher) = ctx.repo.find_publisher_by_id(feed.publisher_id).await? else {
        tracing::warn!("feed {} has no publisher, skipping notifications", feed.uuid);
        return Ok(());
    };

    let subscribers = ctx.portal.list_subscribers(&publisher.uuid).await?;

    for subscriber in subscribers {
        let follow = match ctx
            .portal
            .retrieve_follow(subscriber.user_id, &publisher.uuid)
            .await
        {
            Ok(follow) => follow,
            Err(e) => {
                tracing::error!(
                    "follow lookup failed for user {}: {}",
                    subscriber.user_id,
                    e
                );
                continue;
            }
        };

        // No follow record means not subscribed to this publisher.
        let Some(follow) = follow else { continue };

        if follow.excluded_feeds.iter().any(|f| f == &feed.uuid) {
            continue;
        }

        let payload = build_notification(ctx, article, &publisher, subscriber.user_id);
        if let Err(e) = ctx.portal.create_notification(&payload).await {
            tracing::error!("failed to notify user {}: {}", subscriber.user_id, e);
        }
    }

    if let (Some(channel_id), Some(chat)) = (&feed.channel_id, &ctx.chat) {
        let message = chat_message(ctx, article, &publisher);
        if let Err(e) = chat.send_message(channel_id, &message).await {
            tracing::error!("failed to post chat message for {}: {}", article.slug, e);
        }
    }

    Ok(())
}

fn article_href(ctx: &AppContext, article: &Article) -> String {
    format!("{}/article/{}", ctx.config.website_base_url(), article.slug)
}

fn build_notification(
    ctx: &AppContext,
    article: &Article,
    publisher: &Publisher,
    user_id: i64,
) -> NotificationPayload {
    NotificationPayload {
        user_id,
        app_id: APP_ID,
        time: Utc::now().timestamp(),
        interval: 0,
        title: truncate(&article.title, TITLE_LIMIT),
        body: truncate(article.description.as_deref().unwrap_or(""), BODY_LIMIT),
        icon: Some(publisher.logo_url.clone()),
        image: article.image_url.clone(),
        href: Some(article_href(ctx, article)),
    }
}

fn chat_message(ctx: &AppContext, article: &Article, publisher: &Publisher) -> String {
    format!(
        "<b>{}</b>\n{}\n\n<a href=\"{}\">Read the full article</a>",
        publisher.name,
        article.title,
        article_href(ctx, article)
    )
}
