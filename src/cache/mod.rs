//! Response cache keyed by a deterministic query fingerprint.
//!
//! Two key schemes live side by side and must never collide:
//!
//! * structured keys: `{query_name}:{parent_uuid},{arg}:{value},…` where the
//!   query name always contains a dash (`Query-listArticles`);
//! * feed-scoped keys: the literal prefix `feed,` followed by the raw JSON of
//!   the listing arguments.
//!
//! A structured key therefore never starts with `feed,` (no query is named
//! `feed`), which keeps the schemes disjoint.

use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::context::AppContext;
use crate::error::Result;
use crate::models::{ArticleQuery, User};

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60 * 24);
pub const FEED_CACHE_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 10);
pub const FEED_KEY_PREFIX: &str = "feed,";

struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// In-process key-value cache with per-entry expiration.
pub struct ResponseCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut entries = self.entries.lock().await;

        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                serde_json::from_str(&entry.value).ok()
            }
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub async fn put<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let serialized = serde_json::to_string(value)?;
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            CacheEntry {
                value: serialized,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    /// Push an entry's expiration out to `ttl` from now (sliding expiration).
    pub async fn touch(&self, key: &str, ttl: Duration) {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get_mut(key) {
            entry.expires_at = Instant::now() + ttl;
        }
    }

    /// Overwrite an entry's value while leaving its expiration untouched.
    /// Returns false when the key is missing or already expired.
    pub async fn replace<T: Serialize>(&self, key: &str, value: &T) -> Result<bool> {
        let serialized = serde_json::to_string(value)?;
        let mut entries = self.entries.lock().await;

        match entries.get_mut(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                entry.value = serialized;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Live feed-scoped keys, for the post-ingestion refresh sweep.
    pub async fn feed_keys(&self) -> Vec<String> {
        let entries = self.entries.lock().await;
        let now = Instant::now();
        entries
            .iter()
            .filter(|(key, entry)| key.starts_with(FEED_KEY_PREFIX) && entry.expires_at > now)
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub async fn remaining_ttl(&self, key: &str) -> Option<Duration> {
        let entries = self.entries.lock().await;
        entries
            .get(key)
            .and_then(|entry| entry.expires_at.checked_duration_since(Instant::now()))
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a cacheable query: the payload plus caching directives.
pub struct QueryResult<T> {
    pub caching: bool,
    pub expiration: Option<Duration>,
    pub data: T,
}

impl<T> QueryResult<T> {
    pub fn cached(data: T) -> Self {
        Self {
            caching: true,
            expiration: None,
            data,
        }
    }

    pub fn uncached(data: T) -> Self {
        Self {
            caching: false,
            expiration: None,
            data,
        }
    }
}

/// Builds the structured cache key. Argument pairs are appended in the
/// order given, so identical logical queries always fingerprint identically.
pub fn generate_cache_key(
    query_name: &str,
    parent_uuid: Option<&str>,
    args: &[(&str, String)],
) -> String {
    let mut key = query_name.to_string();

    if let Some(uuid) = parent_uuid {
        key.push(':');
        key.push_str(uuid);
    }

    for (name, value) in args {
        key.push(',');
        key.push_str(name);
        key.push(':');
        key.push_str(value);
    }

    key
}

pub fn feed_cache_key(args: &ArticleQuery) -> Result<String> {
    Ok(format!(
        "{FEED_KEY_PREFIX}{}",
        serde_json::to_string(args)?
    ))
}

/// Listing arguments flattened into key pairs, present fields only,
/// declaration order.
pub fn article_query_args(args: &ArticleQuery) -> Vec<(&'static str, String)> {
    let mut pairs = Vec::new();
    if let Some(limit) = args.limit {
        pairs.push(("limit", limit.to_string()));
    }
    if let Some(offset) = args.offset {
        pairs.push(("offset", offset.to_string()));
    }
    if let Some(publishers) = &args.publishers {
        pairs.push(("publishers", publishers.join(",")));
    }
    if let Some(exclude_feeds) = &args.exclude_feeds {
        pairs.push(("excludeFeeds", exclude_feeds.join(",")));
    }
    pairs
}

/// Runs `query` through the response cache.
///
/// The cache is bypassed entirely when caching is globally disabled, or when
/// the call site opts paid subscribers out (personalization-sensitive
/// queries go through the feed-scoped variant instead).
pub async fn with_cache<T, F, Fut>(
    ctx: &AppContext,
    query_name: &str,
    parent_uuid: Option<&str>,
    args: &[(&str, String)],
    skip_for_paid_plans: bool,
    user: Option<&User>,
    query: F,
) -> Result<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<QueryResult<T>>>,
{
    if ctx.config.caching_disabled
        || (skip_for_paid_plans && user.map(User::is_paid).unwrap_or(false))
    {
        return Ok(query().await?.data);
    }

    let key = generate_cache_key(query_name, parent_uuid, args);

    if let Some(cached) = ctx.cache.get::<T>(&key).await {
        return Ok(cached);
    }

    let result = query().await?;
    if result.caching {
        ctx.cache
            .put(&key, &result.data, result.expiration.unwrap_or(DEFAULT_CACHE_TTL))
            .await?;
    }

    Ok(result.data)
}

/// Feed-scoped caching for the personalized article listing.
///
/// Only paid subscribers with feed exclusions get an entry here; everyone
/// else shares the regular cache (which paid users bypass). Hits slide the
/// expiration forward; misses are stored with the fixed long TTL no matter
/// what the query asked for, because the ingestion sweep refreshes the value
/// in place each cycle.
pub async fn with_feed_cache<T, F, Fut>(
    ctx: &AppContext,
    args: &ArticleQuery,
    user: Option<&User>,
    query: F,
) -> Result<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<QueryResult<T>>>,
{
    if ctx.config.caching_disabled {
        return Ok(query().await?.data);
    }

    if user.map(|u| !u.is_paid()).unwrap_or(true) || args.exclude_feeds.is_none() {
        let pairs = article_query_args(args);
        return with_cache(ctx, "Query-listArticles", None, &pairs, true, user, query).await;
    }

    let key = feed_cache_key(args)?;

    if let Some(cached) = ctx.cache.get::<T>(&key).await {
        ctx.cache.touch(&key, FEED_CACHE_TTL).await;
        return Ok(cached);
    }

    let result = query().await?;
    if result.caching {
        ctx.cache.put(&key, &result.data, FEED_CACHE_TTL).await?;
    }

    Ok(result.data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Plan;
    use crate::testutil;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn cache_keys_are_deterministic() {
        let args = vec![("limit", "10".to_string()), ("offset", "0".to_string())];
        let a = generate_cache_key("Query-listArticles", None, &args);
        let b = generate_cache_key("Query-listArticles", None, &args);
        assert_eq!(a, b);
        assert_eq!(a, "Query-listArticles,limit:10,offset:0");

        let scoped = generate_cache_key("Publisher-articles", Some("abc"), &args);
        assert_eq!(scoped, "Publisher-articles:abc,limit:10,offset:0");
    }

    #[test]
    fn feed_keys_never_collide_with_structured_keys() {
        let feed_key = feed_cache_key(&ArticleQuery {
            limit: Some(10),
            ..Default::default()
        })
        .unwrap();
        assert!(feed_key.starts_with("feed,{"));

        // Structured keys lead with a dashed query name, never the feed prefix.
        let structured = generate_cache_key("Query-listArticles", None, &[]);
        assert!(!structured.starts_with(FEED_KEY_PREFIX));
    }

    #[tokio::test]
    async fn entries_expire() {
        let cache = ResponseCache::new();
        cache.put("k", &1_i64, Duration::from_millis(10)).await.unwrap();
        assert_eq!(cache.get::<i64>("k").await, Some(1));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.get::<i64>("k").await, None);
    }

    #[tokio::test]
    async fn replace_preserves_expiration() {
        let cache = ResponseCache::new();
        cache.put("feed,{}", &1_i64, Duration::from_secs(60)).await.unwrap();

        assert!(cache.replace("feed,{}", &2_i64).await.unwrap());
        assert_eq!(cache.get::<i64>("feed,{}").await, Some(2));

        let remaining = cache.remaining_ttl("feed,{}").await.unwrap();
        assert!(remaining <= Duration::from_secs(60));

        assert!(!cache.replace("missing", &3_i64).await.unwrap());
    }

    #[tokio::test]
    async fn second_identical_call_is_a_hit() {
        let h = testutil::harness().await;
        let calls = AtomicUsize::new(0);
        let args = vec![("limit", "10".to_string())];

        for _ in 0..2 {
            let result: i64 = with_cache(
                &h.ctx,
                "Query-listArticles",
                None,
                &args,
                false,
                None,
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(QueryResult::cached(7_i64))
                },
            )
            .await
            .unwrap();
            assert_eq!(result, 7);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disabled_caching_calls_through() {
        let mut h = testutil::harness().await;
        h.ctx.config.caching_disabled = true;
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let _: i64 = with_cache(
                &h.ctx,
                "Query-listArticles",
                None,
                &[],
                false,
                None,
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(QueryResult::cached(7_i64))
                },
            )
            .await
            .unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn paid_plans_bypass_optout_call_sites() {
        let h = testutil::harness().await;
        let user = User {
            id: 5,
            plan: Plan::Plus,
        };
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let _: i64 = with_cache(
                &h.ctx,
                "Query-listArticles",
                None,
                &[],
                true,
                Some(&user),
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(QueryResult::cached(7_i64))
                },
            )
            .await
            .unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn feed_cache_hits_slide_expiration() {
        let h = testutil::harness().await;
        let user = User {
            id: 5,
            plan: Plan::Plus,
        };
        let args = ArticleQuery {
            exclude_feeds: Some(vec!["some-feed".to_string()]),
            ..Default::default()
        };
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let _: i64 = with_feed_cache(&h.ctx, &args, Some(&user), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(QueryResult::cached(7_i64))
            })
            .await
            .unwrap();
        }

        // Second call served from the feed-scoped entry.
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let key = feed_cache_key(&args).unwrap();
        let remaining = h.ctx.cache.remaining_ttl(&key).await.unwrap();
        assert!(remaining > FEED_CACHE_TTL - Duration::from_secs(5));
    }
}
