//! Bridges the inherent `Database` methods to the [`crate::core::ports::Store`]
//! port so `Core` can depend on `Arc<dyn Store>` without knowing it's SQLite.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::core::ports::Store;
use crate::storage::schema::Database;
use crate::storage::types::{Article, Feed, ParsedArticle, StoreError};

#[async_trait]
impl Store for Database {
    async fn get_feeds(&self) -> Result<Vec<Feed>, StoreError> {
        Database::get_feeds(self).await
    }

    async fn get_feed_by_id(&self, feed_id: i64) -> Result<Option<Feed>, StoreError> {
        Database::get_feed_by_id(self, feed_id).await
    }

    async fn add_feed(&self, url: &str, title: &str) -> Result<i64, StoreError> {
        Database::add_feed(self, url, title).await
    }

    async fn update_feed_error(
        &self,
        feed_id: i64,
        error: Option<&str>,
    ) -> Result<(), StoreError> {
        Database::update_feed_error(self, feed_id, error).await
    }

    async fn update_feed_image(&self, feed_id: i64, image_url: &str) -> Result<(), StoreError> {
        Database::update_feed_image(self, feed_id, image_url).await
    }

    async fn update_feed_link(&self, feed_id: i64, link: &str) -> Result<(), StoreError> {
        Database::update_feed_link(self, feed_id, link).await
    }

    async fn save_articles(
        &self,
        feed_id: i64,
        articles: &[ParsedArticle],
    ) -> Result<usize, StoreError> {
        Database::save_articles(self, feed_id, articles).await
    }

    async fn get_recent_articles(
        &self,
        feed_id: i64,
        limit: i64,
    ) -> Result<Vec<Article>, StoreError> {
        Database::get_recent_articles(self, feed_id, limit).await
    }

    async fn get_articles(
        &self,
        feed_id: Option<i64>,
        category: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Article>, StoreError> {
        Database::get_articles(self, feed_id, category, limit, offset).await
    }

    async fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        Database::get_setting(self, key).await
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        Database::set_setting(self, key, value).await
    }

    async fn increment_stat(&self, name: &str, delta: i64) -> Result<(), StoreError> {
        Database::increment_stat(self, name, delta).await
    }

    async fn get_total_stats(&self) -> Result<HashMap<String, i64>, StoreError> {
        Database::get_total_stats(self).await
    }

    async fn get_database_size_mb(&self) -> Result<f64, StoreError> {
        Database::get_database_size_mb(self).await
    }

    async fn cleanup_article_contents_by_age(
        &self,
        max_age_secs: i64,
    ) -> Result<usize, StoreError> {
        Database::cleanup_article_contents_by_age(self, max_age_secs).await
    }

    async fn cleanup_old_read_articles(&self, max_age_secs: i64) -> Result<usize, StoreError> {
        Database::cleanup_old_read_articles(self, max_age_secs).await
    }

    async fn cleanup_old_unread_articles(&self, max_age_secs: i64) -> Result<usize, StoreError> {
        Database::cleanup_old_unread_articles(self, max_age_secs).await
    }

    async fn cleanup_all_article_contents(&self) -> Result<usize, StoreError> {
        Database::cleanup_all_article_contents(self).await
    }
}
