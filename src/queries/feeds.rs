use crate::cache::{with_cache, QueryResult};
use crate::context::AppContext;
use crate::error::{ApiError, AppError, Result};
use crate::models::{Feed, NewFeed, User};
use crate::services::validation;

#[derive(Debug, Clone)]
pub struct CreateFeedArgs {
    pub publisher_uuid: String,
    pub url: String,
    pub channel_id: Option<String>,
}

pub async fn retrieve_feed(ctx: &AppContext, uuid: &str) -> Result<Option<Feed>> {
    let uuid = uuid.to_string();
    with_cache(
        ctx,
        "Query-retrieveFeed",
        None,
        &[("uuid", uuid.clone())],
        false,
        None,
        || async move { Ok(QueryResult::cached(ctx.repo.find_feed_by_uuid(&uuid).await?)) },
    )
    .await
}

/// Administrative mutation: register a feed for a publisher.
///
/// The source must be reachable and parseable before anything is stored;
/// its name and language come from the parsed feed itself.
pub async fn create_feed(
    ctx: &AppContext,
    user: Option<&User>,
    args: CreateFeedArgs,
) -> Result<Feed> {
    let user = user.ok_or(AppError::Api(ApiError::NOT_AUTHENTICATED))?;
    if !ctx.config.is_admin(user.id) {
        return Err(AppError::Api(ApiError::ACTION_NOT_ALLOWED));
    }

    let Some(publisher) = ctx.repo.find_publisher_by_uuid(&args.publisher_uuid).await? else {
        return Err(AppError::Api(ApiError::PUBLISHER_DOES_NOT_EXIST));
    };

    validation::check(&[validation::validate_url(&args.url)])?;

    let parsed = ctx.parser.parse(&args.url).await?;

    let name = parsed.name.unwrap_or_default();
    let language = parsed.language.unwrap_or_else(|| "en".to_string());

    validation::check(&[
        validation::validate_name_length(&name),
        validation::validate_language(&language),
    ])?;

    ctx.repo
        .create_feed(NewFeed {
            publisher_id: publisher.id,
            url: args.url,
            name: Some(name),
            language: Some(language),
            channel_id: args.channel_id,
        })
        .await
}
