//! Port traits: the seams the core depends on but does not implement.
//!
//! `Store`, `FeedParser`, and `Enricher` are consumed as `Arc<dyn Trait>` by
//! [`super::Core`]. A `Translator` port is declared for completeness (an
//! `Enricher` implementation may want one) but the core never calls it
//! directly.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::storage::{Article, Feed, ParsedArticle, StoreError};

/// Durable state behind feeds, articles, settings, and statistics.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_feeds(&self) -> Result<Vec<Feed>, StoreError>;
    async fn get_feed_by_id(&self, feed_id: i64) -> Result<Option<Feed>, StoreError>;
    async fn add_feed(&self, url: &str, title: &str) -> Result<i64, StoreError>;
    async fn update_feed_error(
        &self,
        feed_id: i64,
        error: Option<&str>,
    ) -> Result<(), StoreError>;
    async fn update_feed_image(&self, feed_id: i64, image_url: &str) -> Result<(), StoreError>;
    async fn update_feed_link(&self, feed_id: i64, link: &str) -> Result<(), StoreError>;

    /// Upsert parsed articles for a feed. Returns the number of newly
    /// inserted rows (existing rows are updated, not recounted).
    async fn save_articles(
        &self,
        feed_id: i64,
        articles: &[ParsedArticle],
    ) -> Result<usize, StoreError>;

    /// Most recent `limit` articles for a feed, newest-published first, used
    /// by the interval calculator's gap analysis.
    async fn get_recent_articles(
        &self,
        feed_id: i64,
        limit: i64,
    ) -> Result<Vec<Article>, StoreError>;

    async fn get_articles(
        &self,
        feed_id: Option<i64>,
        category: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Article>, StoreError>;

    async fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError>;

    async fn increment_stat(&self, name: &str, delta: i64) -> Result<(), StoreError>;
    async fn get_total_stats(&self) -> Result<HashMap<String, i64>, StoreError>;

    async fn get_database_size_mb(&self) -> Result<f64, StoreError>;

    /// Delete `content` for articles older than `max_age_secs`, preserving
    /// metadata rows. Returns the number of rows cleared.
    async fn cleanup_article_contents_by_age(
        &self,
        max_age_secs: i64,
    ) -> Result<usize, StoreError>;

    /// Delete whole read-article rows older than `max_age_secs`, excluding
    /// favorites and read-later. Returns the number of rows deleted.
    async fn cleanup_old_read_articles(&self, max_age_secs: i64) -> Result<usize, StoreError>;

    /// Delete whole unread-article rows older than `max_age_secs`, excluding
    /// favorites and read-later. Returns the number of rows deleted.
    async fn cleanup_old_unread_articles(&self, max_age_secs: i64) -> Result<usize, StoreError>;

    /// Clear `content` on every article regardless of age, excluding
    /// favorites and read-later. Returns the number of rows cleared.
    async fn cleanup_all_article_contents(&self) -> Result<usize, StoreError>;
}

/// Output of a single `FeedParser::parse` call: the feed's own items plus
/// whatever channel-level metadata it carries (logo, canonical link), used
/// by the fetcher to backfill a feed's `image_url`/`link` on first fetch.
#[derive(Debug, Clone, Default)]
pub struct ParsedFeed {
    pub articles: Vec<ParsedArticle>,
    pub image_url: Option<String>,
    pub link: Option<String>,
}

/// Turns fetched bytes into a parsed feed.
#[async_trait]
pub trait FeedParser: Send + Sync {
    async fn parse(&self, bytes: &[u8]) -> Result<ParsedFeed, anyhow::Error>;
}

/// Post-processes a parsed article before it is persisted (summarization,
/// content extraction, translation, ...). A no-op implementation is
/// sufficient for the core to function.
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn enrich(&self, article: ParsedArticle) -> Result<ParsedArticle, anyhow::Error>;
}

/// A collaborator an `Enricher` may delegate to. Never called by the core
/// directly.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, target_lang: &str) -> Result<String, anyhow::Error>;
}

/// Default `Enricher`: returns the article unchanged.
pub struct NoopEnricher;

#[async_trait]
impl Enricher for NoopEnricher {
    async fn enrich(&self, article: ParsedArticle) -> Result<ParsedArticle, anyhow::Error> {
        Ok(article)
    }
}
