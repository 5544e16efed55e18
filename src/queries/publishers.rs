use crate::cache::{with_cache, QueryResult};
use crate::context::AppContext;
use crate::error::{ApiError, AppError, Result};
use crate::models::{ArticleList, ArticleQuery, NewPublisher, Publisher, PublisherUpdate, User};
use crate::services::validation;

#[derive(Debug, Clone)]
pub struct CreatePublisherArgs {
    pub name: String,
    pub description: String,
    pub url: String,
    pub logo_url: String,
}

pub async fn retrieve_publisher(ctx: &AppContext, uuid: &str) -> Result<Option<Publisher>> {
    let uuid = uuid.to_string();
    with_cache(
        ctx,
        "Query-retrievePublisher",
        None,
        &[("uuid", uuid.clone())],
        false,
        None,
        || async move {
            Ok(QueryResult::cached(
                ctx.repo.find_publisher_by_uuid(&uuid).await?,
            ))
        },
    )
    .await
}

/// Articles belonging to any of the publisher's feeds, newest first.
pub async fn publisher_articles(
    ctx: &AppContext,
    publisher: &Publisher,
    limit: Option<i64>,
    offset: Option<i64>,
) -> Result<ArticleList> {
    let mut pairs = Vec::new();
    if let Some(limit) = limit {
        pairs.push(("limit", limit.to_string()));
    }
    if let Some(offset) = offset {
        pairs.push(("offset", offset.to_string()));
    }

    let publisher_uuid = publisher.uuid.clone();
    with_cache(
        ctx,
        "Publisher-articles",
        Some(publisher.uuid.as_str()),
        &pairs,
        false,
        None,
        || async move {
            let list = ctx
                .repo
                .count_and_list_articles(ArticleQuery {
                    limit,
                    offset,
                    publishers: Some(vec![publisher_uuid]),
                    exclude_feeds: None,
                })
                .await?;
            Ok(QueryResult::cached(list))
        },
    )
    .await
}

/// Administrative mutation: register a publisher.
pub async fn create_publisher(
    ctx: &AppContext,
    user: Option<&User>,
    args: CreatePublisherArgs,
) -> Result<Publisher> {
    let user = user.ok_or(AppError::Api(ApiError::NOT_AUTHENTICATED))?;
    if !ctx.config.is_admin(user.id) {
        return Err(AppError::Api(ApiError::ACTION_NOT_ALLOWED));
    }

    validation::check(&[
        validation::validate_name_length(&args.name),
        validation::validate_description_length(&args.description),
        validation::validate_url(&args.url),
        validation::validate_logo_url(&args.logo_url),
    ])?;

    ctx.repo
        .create_publisher(NewPublisher {
            name: args.name,
            description: args.description,
            url: args.url,
            logo_url: args.logo_url,
        })
        .await
}

/// Administrative mutation: update selected publisher fields.
pub async fn update_publisher(
    ctx: &AppContext,
    user: Option<&User>,
    uuid: &str,
    update: PublisherUpdate,
) -> Result<Publisher> {
    let user = user.ok_or(AppError::Api(ApiError::NOT_AUTHENTICATED))?;
    if !ctx.config.is_admin(user.id) {
        return Err(AppError::Api(ApiError::ACTION_NOT_ALLOWED));
    }

    validation::check(&[
        update.name.as_deref().and_then(validation::validate_name_length),
        update
            .description
            .as_deref()
            .and_then(validation::validate_description_length),
        update.url.as_deref().and_then(validation::validate_url),
        update
            .logo_url
            .as_deref()
            .and_then(validation::validate_logo_url),
    ])?;

    ctx.repo
        .update_publisher(uuid, update)
        .await?
        .ok_or(AppError::Api(ApiError::PUBLISHER_DOES_NOT_EXIST))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::validation_errors;
    use crate::models::Plan;
    use crate::testutil;

    fn admin() -> User {
        User {
            id: 1,
            plan: Plan::Free,
        }
    }

    fn valid_args() -> CreatePublisherArgs {
        CreatePublisherArgs {
            name: "The Daily Example".to_string(),
            description: "All the example news".to_string(),
            url: "https://example.com".to_string(),
            logo_url: "https://example.com/logo.png".to_string(),
        }
    }

    #[tokio::test]
    async fn validation_reports_every_failed_field() {
        let h = testutil::harness().await;

        let err = create_publisher(
            &h.ctx,
            Some(&admin()),
            CreatePublisherArgs {
                name: "x".to_string(),
                description: "y".to_string(),
                url: "nope".to_string(),
                logo_url: String::new(),
            },
        )
        .await
        .unwrap_err();

        match err {
            AppError::Validation(codes) => assert_eq!(
                codes,
                vec![
                    validation_errors::NAME_TOO_SHORT,
                    validation_errors::DESCRIPTION_TOO_SHORT,
                    validation_errors::URL_INVALID,
                    validation_errors::LOGO_URL_INVALID,
                ]
            ),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn create_and_update_roundtrip() {
        let h = testutil::harness().await;

        let created = create_publisher(&h.ctx, Some(&admin()), valid_args())
            .await
            .unwrap();
        assert_eq!(created.name, "The Daily Example");

        let updated = update_publisher(
            &h.ctx,
            Some(&admin()),
            &created.uuid,
            PublisherUpdate {
                description: Some("Updated description".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.description, "Updated description");
        // Untouched fields survive
        assert_eq!(updated.name, "The Daily Example");
    }

    #[tokio::test]
    async fn update_of_unknown_publisher_fails() {
        let h = testutil::harness().await;

        let err = update_publisher(
            &h.ctx,
            Some(&admin()),
            "missing-uuid",
            PublisherUpdate::default(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "PUBLISHER_DOES_NOT_EXIST");
    }

    #[tokio::test]
    async fn non_admins_cannot_mutate() {
        let h = testutil::harness().await;
        let outsider = User {
            id: 42,
            plan: Plan::Plus,
        };

        let err = create_publisher(&h.ctx, Some(&outsider), valid_args())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ACTION_NOT_ALLOWED");
    }

    #[tokio::test]
    async fn publisher_articles_lists_only_their_feeds() {
        let h = testutil::harness().await;
        let (publisher_a, feed_a) =
            testutil::seed_publisher_and_feed(&h.ctx, "Acme", "https://a.example.com/feed.xml")
                .await;
        let (_publisher_b, feed_b) =
            testutil::seed_publisher_and_feed(&h.ctx, "Globex", "https://b.example.com/feed.xml")
                .await;

        testutil::seed_article(&h.ctx, &feed_a, "https://a.example.com/1", "From A").await;
        testutil::seed_article(&h.ctx, &feed_b, "https://b.example.com/1", "From B").await;

        let list = publisher_articles(&h.ctx, &publisher_a, None, None)
            .await
            .unwrap();
        assert_eq!(list.total, 1);
        assert_eq!(list.items[0].title, "From A");
    }
}
