use crate::cache::{with_feed_cache, QueryResult};
use crate::context::AppContext;
use crate::error::Result;
use crate::models::{Article, ArticleList, ArticleQuery, Publisher, User};

/// Look up one article by UUID or slug.
pub async fn retrieve_article(ctx: &AppContext, uuid_or_slug: &str) -> Result<Option<Article>> {
    ctx.repo.find_article_by_uuid_or_slug(uuid_or_slug).await
}

/// Paged article listing.
///
/// Paid subscribers with feed exclusions are served through the feed-scoped
/// cache so the ingestion sweep can keep their listings fresh; everyone else
/// goes through the regular response cache.
pub async fn list_articles(
    ctx: &AppContext,
    user: Option<&User>,
    args: ArticleQuery,
) -> Result<ArticleList> {
    let query_args = args.clone();
    with_feed_cache(ctx, &args, user, || async move {
        let list = ctx.repo.count_and_list_articles(query_args).await?;
        Ok(QueryResult::cached(list))
    })
    .await
}

/// The publisher owning the first feed the article was ingested through.
pub async fn article_publisher(
    ctx: &AppContext,
    article: &Article,
) -> Result<Option<Publisher>> {
    let Some(feed) = ctx.repo.first_feed_for_article(article.id).await? else {
        return Ok(None);
    };
    ctx.repo.find_publisher_by_id(feed.publisher_id).await
}

/// Readable article text, fetched live with a fallback to the stored content.
pub async fn article_content(ctx: &AppContext, article: &Article) -> Result<Option<String>> {
    if let Some(text) = ctx.content.fetch_readable(&article.url).await? {
        return Ok(Some(text));
    }
    Ok(article.content.clone())
}

/// Returns the persisted summary, generating and storing it on first demand.
pub async fn article_summary(ctx: &AppContext, article: &Article) -> Result<Option<String>> {
    if article.summary.is_some() {
        return Ok(article.summary.clone());
    }

    let Some(summarizer) = &ctx.summarizer else {
        return Ok(None);
    };

    let Some(content) = article_content(ctx, article).await? else {
        return Ok(None);
    };

    let language = ctx
        .repo
        .first_feed_for_article(article.id)
        .await?
        .and_then(|feed| feed.language);

    let summary = summarizer
        .generate_summary(&article.title, &content, language.as_deref())
        .await?;

    ctx.repo
        .set_article_summary(article.id, summary.clone())
        .await?;

    Ok(Some(summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewArticle;
    use crate::testutil;
    use crate::text::slugify;
    use chrono::Utc;
    use uuid::Uuid;

    #[tokio::test]
    async fn listing_is_served_and_cached() {
        let h = testutil::harness().await;
        let (_publisher, feed) =
            testutil::seed_publisher_and_feed(&h.ctx, "Acme", "https://a.example.com/feed.xml")
                .await;
        testutil::seed_article(&h.ctx, &feed, "https://a.example.com/1", "One").await;

        let list = list_articles(&h.ctx, None, ArticleQuery::default())
            .await
            .unwrap();
        assert_eq!(list.total, 1);

        // Second call comes back identical through the cache.
        let again = list_articles(&h.ctx, None, ArticleQuery::default())
            .await
            .unwrap();
        assert_eq!(again.total, 1);
        assert_eq!(again.items[0].uuid, list.items[0].uuid);
    }

    #[tokio::test]
    async fn publisher_is_resolved_through_the_first_feed() {
        let h = testutil::harness().await;
        let (publisher, feed) =
            testutil::seed_publisher_and_feed(&h.ctx, "Acme", "https://a.example.com/feed.xml")
                .await;
        let article =
            testutil::seed_article(&h.ctx, &feed, "https://a.example.com/1", "One").await;

        let resolved = article_publisher(&h.ctx, &article).await.unwrap().unwrap();
        assert_eq!(resolved.uuid, publisher.uuid);
    }

    #[tokio::test]
    async fn stored_summary_short_circuits_generation() {
        let h = testutil::harness().await;
        let (_publisher, feed) =
            testutil::seed_publisher_and_feed(&h.ctx, "Acme", "https://a.example.com/feed.xml")
                .await;
        let article =
            testutil::seed_article(&h.ctx, &feed, "https://a.example.com/1", "One").await;

        h.ctx
            .repo
            .set_article_summary(article.id, "already summarized".to_string())
            .await
            .unwrap();
        let stored = h
            .ctx
            .repo
            .find_article_by_uuid_or_slug(&article.uuid)
            .await
            .unwrap()
            .unwrap();

        // No summarizer is configured in the harness; the stored summary
        // is all we need.
        let summary = article_summary(&h.ctx, &stored).await.unwrap();
        assert_eq!(summary.as_deref(), Some("already summarized"));
    }

    #[tokio::test]
    async fn unreachable_pages_fall_back_to_stored_content() {
        let h = testutil::harness().await;
        let (_publisher, feed) =
            testutil::seed_publisher_and_feed(&h.ctx, "Acme", "https://a.example.com/feed.xml")
                .await;

        let uuid = Uuid::new_v4().to_string();
        let article = h
            .ctx
            .repo
            .create_article(
                NewArticle {
                    slug: format!("{}-{}", slugify("Offline"), uuid),
                    uuid,
                    // Nothing listens here; the live fetch fails fast.
                    url: "http://127.0.0.1:9/offline".to_string(),
                    title: "Offline".to_string(),
                    description: None,
                    date: Utc::now(),
                    image_url: None,
                    content: Some("stored body".to_string()),
                },
                feed.id,
            )
            .await
            .unwrap()
            .unwrap();

        let content = article_content(&h.ctx, &article).await.unwrap();
        assert_eq!(content.as_deref(), Some("stored body"));
    }
}
