use super::schema::Database;
use super::types::StoreError;

impl Database {
    /// Clear `content` on articles fetched more than `max_age_secs` ago,
    /// excluding favorites and read-later, which are never auto-evicted.
    /// Rows themselves (and their read/flag state) are kept.
    pub async fn cleanup_article_contents_by_age(
        &self,
        max_age_secs: i64,
    ) -> Result<usize, StoreError> {
        let cutoff = chrono::Utc::now().timestamp() - max_age_secs;
        let result = sqlx::query(
            r#"
            UPDATE articles SET content = NULL
            WHERE fetched_at < ? AND content IS NOT NULL
              AND is_favorite = 0 AND is_read_later = 0
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(result.rows_affected() as usize)
    }

    /// Delete whole read-article rows older than `max_age_secs`, excluding
    /// favorites and read-later.
    pub async fn cleanup_old_read_articles(&self, max_age_secs: i64) -> Result<usize, StoreError> {
        let cutoff = chrono::Utc::now().timestamp() - max_age_secs;
        let result = sqlx::query(
            r#"
            DELETE FROM articles
            WHERE fetched_at < ? AND is_read = 1
              AND is_favorite = 0 AND is_read_later = 0
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(result.rows_affected() as usize)
    }

    /// Delete whole unread-article rows older than `max_age_secs`, excluding
    /// favorites and read-later. Last-resort layer.
    pub async fn cleanup_old_unread_articles(
        &self,
        max_age_secs: i64,
    ) -> Result<usize, StoreError> {
        let cutoff = chrono::Utc::now().timestamp() - max_age_secs;
        let result = sqlx::query(
            r#"
            DELETE FROM articles
            WHERE fetched_at < ? AND is_read = 0
              AND is_favorite = 0 AND is_read_later = 0
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(result.rows_affected() as usize)
    }

    /// Clear `content` on every article regardless of age, excluding
    /// favorites and read-later. Used by manual "clear cached content".
    pub async fn cleanup_all_article_contents(&self) -> Result<usize, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE articles SET content = NULL
            WHERE content IS NOT NULL AND is_favorite = 0 AND is_read_later = 0
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(result.rows_affected() as usize)
    }
}
