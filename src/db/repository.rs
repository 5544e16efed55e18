use chrono::{DateTime, Utc};
use rusqlite::types::ToSql;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use tokio_rusqlite::Connection;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    Article, ArticleList, ArticleQuery, Feed, NewArticle, NewFeed, NewPublisher, Publisher,
    PublisherUpdate,
};

use super::schema::SCHEMA;

const PUBLISHER_COLUMNS: &str = "id, uuid, name, description, url, logo_url";
const FEED_COLUMNS: &str = "id, uuid, publisher_id, url, name, language, channel_id";
const ARTICLE_COLUMNS: &str =
    "a.id, a.uuid, a.slug, a.url, a.title, a.description, a.date, a.image_url, a.content, a.summary";

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Publisher operations

    pub async fn create_publisher(&self, publisher: NewPublisher) -> Result<Publisher> {
        let created = self
            .conn
            .call(move |conn| {
                let uuid = Uuid::new_v4().to_string();
                conn.execute(
                    "INSERT INTO publishers (uuid, name, description, url, logo_url)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        uuid,
                        publisher.name,
                        publisher.description,
                        publisher.url,
                        publisher.logo_url,
                    ],
                )?;
                let id = conn.last_insert_rowid();
                let created = conn.query_row(
                    &format!("SELECT {PUBLISHER_COLUMNS} FROM publishers WHERE id = ?1"),
                    params![id],
                    |row| Ok(publisher_from_row(row)),
                )?;
                Ok(created)
            })
            .await?;
        Ok(created)
    }

    /// Applies the provided fields, leaving the rest untouched.
    pub async fn update_publisher(
        &self,
        uuid: &str,
        update: PublisherUpdate,
    ) -> Result<Option<Publisher>> {
        let uuid = uuid.to_string();
        let updated = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE publishers SET
                         name = COALESCE(?1, name),
                         description = COALESCE(?2, description),
                         url = COALESCE(?3, url),
                         logo_url = COALESCE(?4, logo_url)
                     WHERE uuid = ?5",
                    params![
                        update.name,
                        update.description,
                        update.url,
                        update.logo_url,
                        uuid,
                    ],
                )?;
                let updated = conn
                    .query_row(
                        &format!("SELECT {PUBLISHER_COLUMNS} FROM publishers WHERE uuid = ?1"),
                        params![uuid],
                        |row| Ok(publisher_from_row(row)),
                    )
                    .optional()?;
                Ok(updated)
            })
            .await?;
        Ok(updated)
    }

    pub async fn find_publisher_by_uuid(&self, uuid: &str) -> Result<Option<Publisher>> {
        let uuid = uuid.to_string();
        let publisher = self
            .conn
            .call(move |conn| {
                let publisher = conn
                    .query_row(
                        &format!("SELECT {PUBLISHER_COLUMNS} FROM publishers WHERE uuid = ?1"),
                        params![uuid],
                        |row| Ok(publisher_from_row(row)),
                    )
                    .optional()?;
                Ok(publisher)
            })
            .await?;
        Ok(publisher)
    }

    pub async fn find_publisher_by_id(&self, id: i64) -> Result<Option<Publisher>> {
        let publisher = self
            .conn
            .call(move |conn| {
                let publisher = conn
                    .query_row(
                        &format!("SELECT {PUBLISHER_COLUMNS} FROM publishers WHERE id = ?1"),
                        params![id],
                        |row| Ok(publisher_from_row(row)),
                    )
                    .optional()?;
                Ok(publisher)
            })
            .await?;
        Ok(publisher)
    }

    // Feed operations

    pub async fn create_feed(&self, feed: NewFeed) -> Result<Feed> {
        let created = self
            .conn
            .call(move |conn| {
                let uuid = Uuid::new_v4().to_string();
                conn.execute(
                    "INSERT INTO feeds (uuid, publisher_id, url, name, language, channel_id)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        uuid,
                        feed.publisher_id,
                        feed.url,
                        feed.name,
                        feed.language,
                        feed.channel_id,
                    ],
                )?;
                let id = conn.last_insert_rowid();
                let created = conn.query_row(
                    &format!("SELECT {FEED_COLUMNS} FROM feeds WHERE id = ?1"),
                    params![id],
                    |row| Ok(feed_from_row(row)),
                )?;
                Ok(created)
            })
            .await?;
        Ok(created)
    }

    pub async fn get_all_feeds(&self) -> Result<Vec<Feed>> {
        let feeds = self
            .conn
            .call(|conn| {
                let mut stmt =
                    conn.prepare(&format!("SELECT {FEED_COLUMNS} FROM feeds ORDER BY id"))?;
                let feeds = stmt
                    .query_map([], |row| Ok(feed_from_row(row)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(feeds)
            })
            .await?;
        Ok(feeds)
    }

    pub async fn find_feed_by_uuid(&self, uuid: &str) -> Result<Option<Feed>> {
        let uuid = uuid.to_string();
        let feed = self
            .conn
            .call(move |conn| {
                let feed = conn
                    .query_row(
                        &format!("SELECT {FEED_COLUMNS} FROM feeds WHERE uuid = ?1"),
                        params![uuid],
                        |row| Ok(feed_from_row(row)),
                    )
                    .optional()?;
                Ok(feed)
            })
            .await?;
        Ok(feed)
    }

    /// First feed an article was ingested through, used to resolve its publisher.
    pub async fn first_feed_for_article(&self, article_id: i64) -> Result<Option<Feed>> {
        let feed = self
            .conn
            .call(move |conn| {
                let feed = conn
                    .query_row(
                        &format!(
                            "SELECT {FEED_COLUMNS} FROM feeds
                             WHERE id = (SELECT MIN(feed_id) FROM article_feeds WHERE article_id = ?1)"
                        ),
                        params![article_id],
                        |row| Ok(feed_from_row(row)),
                    )
                    .optional()?;
                Ok(feed)
            })
            .await?;
        Ok(feed)
    }

    // Article operations

    pub async fn find_article_by_url(&self, url: &str) -> Result<Option<Article>> {
        let url = url.to_string();
        let article = self
            .conn
            .call(move |conn| {
                let article = conn
                    .query_row(
                        &format!("SELECT {ARTICLE_COLUMNS} FROM articles a WHERE a.url = ?1"),
                        params![url],
                        |row| Ok(article_from_row(row)),
                    )
                    .optional()?;
                Ok(article)
            })
            .await?;
        Ok(article)
    }

    /// Accepts either a UUID or a slug and dispatches on the shape of the identifier.
    pub async fn find_article_by_uuid_or_slug(&self, id: &str) -> Result<Option<Article>> {
        let column = if Uuid::parse_str(id).is_ok() {
            "uuid"
        } else {
            "slug"
        };
        let id = id.to_string();
        let article = self
            .conn
            .call(move |conn| {
                let article = conn
                    .query_row(
                        &format!("SELECT {ARTICLE_COLUMNS} FROM articles a WHERE a.{column} = ?1"),
                        params![id],
                        |row| Ok(article_from_row(row)),
                    )
                    .optional()?;
                Ok(article)
            })
            .await?;
        Ok(article)
    }

    /// Creates the article and its first feed association atomically.
    ///
    /// Returns `None` when another writer created an article with the same
    /// URL first; the unique constraint on `articles.url` is the only
    /// synchronization against that race.
    pub async fn create_article(
        &self,
        article: NewArticle,
        feed_id: i64,
    ) -> Result<Option<Article>> {
        let created = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;

                let inserted = tx.execute(
                    "INSERT INTO articles (uuid, slug, url, title, description, date, image_url, content)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        article.uuid,
                        article.slug,
                        article.url,
                        article.title,
                        article.description,
                        article.date.to_rfc3339(),
                        article.image_url,
                        article.content,
                    ],
                );

                match inserted {
                    Ok(_) => {}
                    Err(e) if is_unique_violation(&e) => return Ok(None),
                    Err(e) => return Err(e.into()),
                }

                let article_id = tx.last_insert_rowid();
                tx.execute(
                    "INSERT INTO article_feeds (article_id, feed_id) VALUES (?1, ?2)",
                    params![article_id, feed_id],
                )?;

                let created = tx.query_row(
                    &format!("SELECT {ARTICLE_COLUMNS} FROM articles a WHERE a.id = ?1"),
                    params![article_id],
                    |row| Ok(article_from_row(row)),
                )?;

                tx.commit()?;
                Ok(Some(created))
            })
            .await?;
        Ok(created)
    }

    /// Associates an article with a feed; a no-op if the association exists.
    pub async fn attach_article_to_feed(&self, article_id: i64, feed_id: i64) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT OR IGNORE INTO article_feeds (article_id, feed_id) VALUES (?1, ?2)",
                    params![article_id, feed_id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn article_feed_ids(&self, article_id: i64) -> Result<Vec<i64>> {
        let ids = self
            .conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare("SELECT feed_id FROM article_feeds WHERE article_id = ?1 ORDER BY feed_id")?;
                let ids = stmt
                    .query_map(params![article_id], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(ids)
            })
            .await?;
        Ok(ids)
    }

    /// Stores a generated summary, once. Later calls leave the stored value alone.
    pub async fn set_article_summary(&self, article_id: i64, summary: String) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE articles SET summary = ?1 WHERE id = ?2 AND summary IS NULL",
                    params![summary, article_id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Counts and pages in one transaction so total and items come from the
    /// same snapshot. Non-positive limits fall back to 10, negative offsets to 0.
    pub async fn count_and_list_articles(&self, query: ArticleQuery) -> Result<ArticleList> {
        let mut limit = query.limit.unwrap_or(10);
        if limit <= 0 {
            limit = 10;
        }
        let offset = query.offset.unwrap_or(0).max(0);

        let list = self
            .conn
            .call(move |conn| {
                let mut clauses: Vec<String> = Vec::new();
                let mut values: Vec<Box<dyn ToSql>> = Vec::new();

                if let Some(publishers) = &query.publishers {
                    if !publishers.is_empty() {
                        let marks = vec!["?"; publishers.len()].join(", ");
                        clauses.push(format!(
                            "EXISTS (SELECT 1 FROM article_feeds af
                                     JOIN feeds f ON f.id = af.feed_id
                                     JOIN publishers p ON p.id = f.publisher_id
                                     WHERE af.article_id = a.id AND p.uuid IN ({marks}))"
                        ));
                        values.extend(
                            publishers
                                .iter()
                                .map(|u| Box::new(u.clone()) as Box<dyn ToSql>),
                        );
                    }
                }

                if let Some(exclude_feeds) = &query.exclude_feeds {
                    if !exclude_feeds.is_empty() {
                        let marks = vec!["?"; exclude_feeds.len()].join(", ");
                        clauses.push(format!(
                            "NOT EXISTS (SELECT 1 FROM article_feeds af
                                         JOIN feeds f ON f.id = af.feed_id
                                         WHERE af.article_id = a.id AND f.uuid IN ({marks}))"
                        ));
                        values.extend(
                            exclude_feeds
                                .iter()
                                .map(|u| Box::new(u.clone()) as Box<dyn ToSql>),
                        );
                    }
                }

                let where_sql = if clauses.is_empty() {
                    String::new()
                } else {
                    format!(" WHERE {}", clauses.join(" AND "))
                };

                let tx = conn.transaction()?;

                let total: i64 = tx.query_row(
                    &format!("SELECT COUNT(*) FROM articles a{where_sql}"),
                    params_from_iter(values.iter()),
                    |row| row.get(0),
                )?;

                values.push(Box::new(limit));
                values.push(Box::new(offset));

                let mut stmt = tx.prepare(&format!(
                    "SELECT {ARTICLE_COLUMNS} FROM articles a{where_sql}
                     ORDER BY a.date DESC LIMIT ? OFFSET ?"
                ))?;
                let items = stmt
                    .query_map(params_from_iter(values.iter()), |row| {
                        Ok(article_from_row(row))
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                drop(stmt);

                tx.commit()?;
                Ok(ArticleList { total, items })
            })
            .await?;
        Ok(list)
    }
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn publisher_from_row(row: &Row) -> Publisher {
    Publisher {
        id: row.get(0).unwrap(),
        uuid: row.get(1).unwrap(),
        name: row.get(2).unwrap(),
        description: row.get(3).unwrap(),
        url: row.get(4).unwrap(),
        logo_url: row.get(5).unwrap(),
    }
}

fn feed_from_row(row: &Row) -> Feed {
    Feed {
        id: row.get(0).unwrap(),
        uuid: row.get(1).unwrap(),
        publisher_id: row.get(2).unwrap(),
        url: row.get(3).unwrap(),
        name: row.get(4).unwrap(),
        language: row.get(5).unwrap(),
        channel_id: row.get(6).unwrap(),
    }
}

fn article_from_row(row: &Row) -> Article {
    Article {
        id: row.get(0).unwrap(),
        uuid: row.get(1).unwrap(),
        slug: row.get(2).unwrap(),
        url: row.get(3).unwrap(),
        title: row.get(4).unwrap(),
        description: row.get(5).unwrap(),
        date: row
            .get::<_, String>(6)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
        image_url: row.get(7).unwrap(),
        content: row.get(8).unwrap(),
        summary: row.get(9).unwrap(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::slugify;
    use chrono::TimeZone;

    async fn test_repo() -> (tempfile::TempDir, Repository) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let repo = Repository::new(path.to_str().unwrap()).await.unwrap();
        (dir, repo)
    }

    async fn seed_feed(repo: &Repository, publisher_name: &str, feed_url: &str) -> Feed {
        let publisher = repo
            .create_publisher(NewPublisher {
                name: publisher_name.to_string(),
                description: "A test publisher".to_string(),
                url: "https://example.com".to_string(),
                logo_url: "https://example.com/logo.png".to_string(),
            })
            .await
            .unwrap();

        repo.create_feed(NewFeed {
            publisher_id: publisher.id,
            url: feed_url.to_string(),
            name: Some(format!("{publisher_name} feed")),
            language: Some("en".to_string()),
            channel_id: None,
        })
        .await
        .unwrap()
    }

    fn new_article(url: &str, title: &str, ts: i64) -> NewArticle {
        let uuid = Uuid::new_v4().to_string();
        NewArticle {
            slug: format!("{}-{}", slugify(title), uuid),
            uuid,
            url: url.to_string(),
            title: title.to_string(),
            description: Some("desc".to_string()),
            date: Utc.timestamp_opt(ts, 0).unwrap(),
            image_url: None,
            content: None,
        }
    }

    #[tokio::test]
    async fn duplicate_url_creation_returns_none() {
        let (_dir, repo) = test_repo().await;
        let feed = seed_feed(&repo, "Acme", "https://example.com/feed.xml").await;

        let first = repo
            .create_article(new_article("https://example.com/a", "First", 100), feed.id)
            .await
            .unwrap();
        assert!(first.is_some());

        let second = repo
            .create_article(new_article("https://example.com/a", "Second", 200), feed.id)
            .await
            .unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn attach_to_feed_is_idempotent() {
        let (_dir, repo) = test_repo().await;
        let feed = seed_feed(&repo, "Acme", "https://example.com/feed.xml").await;
        let article = repo
            .create_article(new_article("https://example.com/a", "One", 100), feed.id)
            .await
            .unwrap()
            .unwrap();

        repo.attach_article_to_feed(article.id, feed.id).await.unwrap();
        repo.attach_article_to_feed(article.id, feed.id).await.unwrap();

        assert_eq!(repo.article_feed_ids(article.id).await.unwrap(), vec![feed.id]);
    }

    #[tokio::test]
    async fn pagination_coerces_limit_and_offset() {
        let (_dir, repo) = test_repo().await;
        let feed = seed_feed(&repo, "Acme", "https://example.com/feed.xml").await;

        for i in 0..15 {
            repo.create_article(
                new_article(&format!("https://example.com/{i}"), &format!("Article {i}"), i),
                feed.id,
            )
            .await
            .unwrap();
        }

        let coerced = repo
            .count_and_list_articles(ArticleQuery {
                limit: Some(0),
                offset: Some(-5),
                ..Default::default()
            })
            .await
            .unwrap();
        let defaults = repo
            .count_and_list_articles(ArticleQuery::default())
            .await
            .unwrap();

        assert_eq!(coerced.total, 15);
        assert_eq!(coerced.items.len(), 10);
        assert_eq!(
            coerced.items.iter().map(|a| a.id).collect::<Vec<_>>(),
            defaults.items.iter().map(|a| a.id).collect::<Vec<_>>()
        );
        // Newest first
        assert_eq!(coerced.items[0].title, "Article 14");
    }

    #[tokio::test]
    async fn listing_filters_by_publisher_and_excluded_feeds() {
        let (_dir, repo) = test_repo().await;
        let feed_a = seed_feed(&repo, "Acme", "https://a.example.com/feed.xml").await;
        let feed_b = seed_feed(&repo, "Globex", "https://b.example.com/feed.xml").await;

        repo.create_article(new_article("https://a.example.com/1", "From A", 100), feed_a.id)
            .await
            .unwrap();
        repo.create_article(new_article("https://b.example.com/1", "From B", 200), feed_b.id)
            .await
            .unwrap();

        let publisher_a = repo.find_publisher_by_id(feed_a.publisher_id).await.unwrap().unwrap();

        let only_a = repo
            .count_and_list_articles(ArticleQuery {
                publishers: Some(vec![publisher_a.uuid.clone()]),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(only_a.total, 1);
        assert_eq!(only_a.items[0].title, "From A");

        let without_b = repo
            .count_and_list_articles(ArticleQuery {
                exclude_feeds: Some(vec![feed_b.uuid.clone()]),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(without_b.total, 1);
        assert_eq!(without_b.items[0].title, "From A");
    }

    #[tokio::test]
    async fn find_by_uuid_or_slug_dispatches_on_shape() {
        let (_dir, repo) = test_repo().await;
        let feed = seed_feed(&repo, "Acme", "https://example.com/feed.xml").await;
        let article = repo
            .create_article(new_article("https://example.com/a", "Find Me", 100), feed.id)
            .await
            .unwrap()
            .unwrap();

        let by_uuid = repo
            .find_article_by_uuid_or_slug(&article.uuid)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_uuid.id, article.id);

        let by_slug = repo
            .find_article_by_uuid_or_slug(&article.slug)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_slug.id, article.id);
    }

    #[tokio::test]
    async fn summary_is_written_once() {
        let (_dir, repo) = test_repo().await;
        let feed = seed_feed(&repo, "Acme", "https://example.com/feed.xml").await;
        let article = repo
            .create_article(new_article("https://example.com/a", "One", 100), feed.id)
            .await
            .unwrap()
            .unwrap();

        repo.set_article_summary(article.id, "first".to_string()).await.unwrap();
        repo.set_article_summary(article.id, "second".to_string()).await.unwrap();

        let stored = repo
            .find_article_by_uuid_or_slug(&article.uuid)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.summary.as_deref(), Some("first"));
    }
}
