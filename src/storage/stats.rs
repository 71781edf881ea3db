use std::collections::HashMap;

use super::schema::Database;
use super::types::StoreError;

impl Database {
    pub async fn increment_stat(&self, name: &str, delta: i64) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO statistics (name, value) VALUES (?, ?)
            ON CONFLICT(name) DO UPDATE SET value = value + excluded.value
            "#,
        )
        .bind(name)
        .bind(delta)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(())
    }

    pub async fn get_total_stats(&self) -> Result<HashMap<String, i64>, StoreError> {
        let rows: Vec<(String, i64)> = sqlx::query_as("SELECT name, value FROM statistics")
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;

        Ok(rows.into_iter().collect())
    }

    /// Database file size in megabytes, via SQLite's page accounting.
    pub async fn get_database_size_mb(&self) -> Result<f64, StoreError> {
        let (page_count,): (i64,) = sqlx::query_as("PRAGMA page_count")
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        let (page_size,): (i64,) = sqlx::query_as("PRAGMA page_size")
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;

        let bytes = (page_count * page_size) as f64;
        Ok(bytes / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::Database;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn increment_stat_accumulates() {
        let db = test_db().await;
        db.increment_stat("feed_refresh", 1).await.unwrap();
        db.increment_stat("feed_refresh", 1).await.unwrap();
        db.increment_stat("article_saved", 5).await.unwrap();

        let stats = db.get_total_stats().await.unwrap();
        assert_eq!(stats.get("feed_refresh"), Some(&2));
        assert_eq!(stats.get("article_saved"), Some(&5));
    }

    #[tokio::test]
    async fn database_size_is_nonnegative() {
        let db = test_db().await;
        let size = db.get_database_size_mb().await.unwrap();
        assert!(size >= 0.0);
    }
}
