use sqlx::QueryBuilder;

use super::schema::Database;
use super::types::{Article, ArticleDbRow, ParsedArticle, StoreError};

/// Hard cap on rows returned from any single query, independent of the
/// caller-supplied limit (OOM protection).
const MAX_ARTICLES: i64 = 2000;

const ARTICLE_COLUMNS: &str = r#"
    id, feed_id, url, title, published_at, content,
    is_read, is_favorite, is_hidden, is_read_later, fetched_at
"#;

impl Database {
    // ========================================================================
    // Article Mutations
    // ========================================================================

    /// Upsert parsed articles for a feed, returning the number of newly
    /// inserted rows.
    ///
    /// Two-phase insert (`INSERT OR IGNORE` + `UPDATE ... CASE`) with
    /// `changes()` avoids the double table scan a before/after `COUNT` would
    /// need. Existing rows keep their `is_read`/`is_favorite`/`is_hidden`/
    /// `is_read_later` flags and `fetched_at` (first-seen timestamp);
    /// `title`/`url`/`published_at`/`content` are refreshed from the feed.
    /// Batches of 50 keep bound parameters (7 columns * 50 = 350) well under
    /// SQLite's 999-parameter limit.
    pub async fn save_articles(
        &self,
        feed_id: i64,
        articles: &[ParsedArticle],
    ) -> Result<usize, StoreError> {
        if articles.is_empty() {
            return Ok(0);
        }

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await.map_err(StoreError::from_sqlx)?;

        const BATCH_SIZE: usize = 50;
        let mut total_inserted: usize = 0;

        for chunk in articles.chunks(BATCH_SIZE) {
            let mut insert_builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
                "INSERT OR IGNORE INTO articles (feed_id, guid, url, title, published_at, content, fetched_at) ",
            );
            insert_builder.push_values(chunk, |mut b, article| {
                b.push_bind(feed_id)
                    .push_bind(&article.guid)
                    .push_bind(article.url.clone().unwrap_or_else(|| article.guid.clone()))
                    .push_bind(&article.title)
                    .push_bind(article.published)
                    .push_bind(&article.content)
                    .push_bind(now);
            });
            insert_builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(StoreError::from_sqlx)?;

            let changes: (i64,) = sqlx::query_as("SELECT changes()")
                .fetch_one(&mut *tx)
                .await
                .map_err(StoreError::from_sqlx)?;
            total_inserted += changes.0 as usize;

            let mut update_builder: QueryBuilder<sqlx::Sqlite> =
                QueryBuilder::new("UPDATE articles SET title = CASE guid ");
            for article in chunk {
                update_builder.push("WHEN ");
                update_builder.push_bind(&article.guid);
                update_builder.push(" THEN ");
                update_builder.push_bind(&article.title);
                update_builder.push(" ");
            }
            update_builder.push("ELSE title END, published_at = CASE guid ");
            for article in chunk {
                update_builder.push("WHEN ");
                update_builder.push_bind(&article.guid);
                update_builder.push(" THEN ");
                update_builder.push_bind(article.published);
                update_builder.push(" ");
            }
            update_builder.push("ELSE published_at END WHERE feed_id = ");
            update_builder.push_bind(feed_id);
            update_builder.push(" AND guid IN (");
            let mut separated = update_builder.separated(", ");
            for article in chunk {
                separated.push_bind(&article.guid);
            }
            separated.push_unseparated(")");

            update_builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(StoreError::from_sqlx)?;
        }

        tx.commit().await.map_err(StoreError::from_sqlx)?;
        Ok(total_inserted)
    }

    // ========================================================================
    // Article Queries
    // ========================================================================

    /// Most recent `limit` articles for a feed, newest-published first, ties
    /// broken by article id ascending. Feeds the interval calculator's gap
    /// analysis.
    pub async fn get_recent_articles(
        &self,
        feed_id: i64,
        limit: i64,
    ) -> Result<Vec<Article>, StoreError> {
        let limit = limit.clamp(0, MAX_ARTICLES);
        let query = format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE feed_id = ? \
             ORDER BY published_at DESC, id ASC LIMIT ?"
        );
        let rows: Vec<ArticleDbRow> = sqlx::query_as(&query)
            .bind(feed_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;

        Ok(rows.into_iter().map(ArticleDbRow::into_article).collect())
    }

    /// Articles filtered by feed and/or category, paginated, newest first.
    pub async fn get_articles(
        &self,
        feed_id: Option<i64>,
        category: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Article>, StoreError> {
        let limit = limit.clamp(0, MAX_ARTICLES);

        let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles a WHERE 1=1"
        ));

        if let Some(fid) = feed_id {
            builder.push(" AND a.feed_id = ");
            builder.push_bind(fid);
        }
        if let Some(cat) = category {
            builder.push(" AND a.feed_id IN (SELECT id FROM feeds WHERE category = ");
            builder.push_bind(cat.to_string());
            builder.push(")");
        }
        builder.push(" ORDER BY a.published_at DESC, a.id ASC LIMIT ");
        builder.push_bind(limit);
        builder.push(" OFFSET ");
        builder.push_bind(offset);

        let rows: Vec<ArticleDbRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;

        Ok(rows.into_iter().map(ArticleDbRow::into_article).collect())
    }
}
