use super::schema::Database;
use super::types::{Feed, FeedDbRow, StoreError};

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    const FEED_COLUMNS: &'static str = r#"
        id, title, url, html_url, image_url, category, last_updated, last_error,
        last_update_status, proxy, is_freshrss_source,
        discovery_completed, custom_script, xpath_rules
    "#;

    pub async fn get_feeds(&self) -> Result<Vec<Feed>, StoreError> {
        let query = format!("SELECT {} FROM feeds ORDER BY title ASC", Self::FEED_COLUMNS);
        let rows: Vec<FeedDbRow> = sqlx::query_as(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;

        Ok(rows.into_iter().map(FeedDbRow::into_feed).collect())
    }

    pub async fn get_feed_by_id(&self, feed_id: i64) -> Result<Option<Feed>, StoreError> {
        let query = format!("SELECT {} FROM feeds WHERE id = ?", Self::FEED_COLUMNS);
        let row: Option<FeedDbRow> = sqlx::query_as(&query)
        .bind(feed_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(row.map(FeedDbRow::into_feed))
    }

    /// Insert a new feed, or return the existing id if `url` is already
    /// subscribed (updating its title).
    pub async fn add_feed(&self, url: &str, title: &str) -> Result<i64, StoreError> {
        let id: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO feeds (title, url)
            VALUES (?, ?)
            ON CONFLICT(url) DO UPDATE SET title = excluded.title
            RETURNING id
            "#,
        )
        .bind(title)
        .bind(url)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(id.0)
    }

    /// Set or clear `last_error`. `None` clears the error and marks the feed
    /// `Success`; `Some` sets the error and marks it `Failed`.
    pub async fn update_feed_error(
        &self,
        feed_id: i64,
        error: Option<&str>,
    ) -> Result<(), StoreError> {
        let now = chrono::Utc::now().timestamp();
        let status = if error.is_some() { "failed" } else { "success" };

        sqlx::query(
            r#"
            UPDATE feeds
            SET last_error = ?, last_update_status = ?, last_updated = ?
            WHERE id = ?
            "#,
        )
        .bind(error)
        .bind(status)
        .bind(now)
        .bind(feed_id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(())
    }

    pub async fn update_feed_image(&self, feed_id: i64, image_url: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE feeds SET image_url = ? WHERE id = ?")
            .bind(image_url)
            .bind(feed_id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    pub async fn update_feed_link(&self, feed_id: i64, link: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE feeds SET html_url = ? WHERE id = ?")
            .bind(link)
            .bind(feed_id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(())
    }
}
