//! Interval Calculator: derives a per-feed refresh interval from recent
//! publication history.
//!
//! Algorithm: take the N most recent articles (ordered by `published_at`
//! descending, ties broken by article id ascending so the ordering is total),
//! compute the gaps between consecutive publication timestamps, take the
//! median gap, and halve it (Nyquist — sampling at twice the rate articles
//! actually arrive catches new ones promptly without over-polling). The
//! result is clamped to `[MIN_REFRESH_INTERVAL, MAX_REFRESH_INTERVAL]`; with
//! fewer than [`LOW_HISTORY_THRESHOLD`] articles the result is further capped
//! at `DEFAULT_REFRESH_INTERVAL` — a handful of articles isn't enough history
//! to justify polling less often than the default.
//!
//! Any `Store` error, or fewer than two articles to form a gap from, yields
//! `DEFAULT_REFRESH_INTERVAL` — this calculator never returns `Err`.

use std::sync::Arc;
use std::time::Duration;

use crate::core::ports::Store;

pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(5 * 60);
pub const MAX_REFRESH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Number of most-recent articles consulted for gap analysis.
const HISTORY_WINDOW: i64 = 20;

/// Below this many timestamps, history is too short to trust an
/// interval longer than the default — clamp to `≤ DEFAULT_REFRESH_INTERVAL`.
const LOW_HISTORY_THRESHOLD: usize = 10;

/// Compute the refresh interval for `feed_id` from its article history.
pub async fn calculate_interval(store: &Arc<dyn Store>, feed_id: i64) -> Duration {
    let articles = match store.get_recent_articles(feed_id, HISTORY_WINDOW).await {
        Ok(a) => a,
        Err(e) => {
            tracing::warn!(feed_id, error = %e, "interval calculator: store error, using default");
            return DEFAULT_REFRESH_INTERVAL;
        }
    };

    let mut timestamps: Vec<(i64, i64)> = articles
        .iter()
        .filter_map(|a| a.published_at.map(|p| (p, a.id)))
        .collect();

    // newest first, ties broken by id ascending for a total order
    timestamps.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

    if timestamps.len() < 2 {
        return DEFAULT_REFRESH_INTERVAL;
    }

    let mut gaps: Vec<i64> = timestamps
        .windows(2)
        .map(|w| (w[0].0 - w[1].0).abs())
        .collect();
    gaps.sort_unstable();

    let median = median_of(&gaps);
    let nyquist = median / 2;

    let proposed = clamp(Duration::from_secs(nyquist.max(0) as u64));
    if timestamps.len() < LOW_HISTORY_THRESHOLD {
        proposed.min(DEFAULT_REFRESH_INTERVAL)
    } else {
        proposed
    }
}

fn median_of(sorted: &[i64]) -> i64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2
    }
}

fn clamp(d: Duration) -> Duration {
    d.clamp(MIN_REFRESH_INTERVAL, MAX_REFRESH_INTERVAL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    use crate::storage::{Article, Feed, ParsedArticle, StoreError};

    struct FakeStore {
        articles: Mutex<Vec<Article>>,
        fail: bool,
    }

    #[async_trait]
    impl Store for FakeStore {
        async fn get_feeds(&self) -> Result<Vec<Feed>, StoreError> {
            Ok(vec![])
        }
        async fn get_feed_by_id(&self, _feed_id: i64) -> Result<Option<Feed>, StoreError> {
            Ok(None)
        }
        async fn add_feed(&self, _url: &str, _title: &str) -> Result<i64, StoreError> {
            Ok(1)
        }
        async fn update_feed_error(
            &self,
            _feed_id: i64,
            _error: Option<&str>,
        ) -> Result<(), StoreError> {
            Ok(())
        }
        async fn update_feed_image(&self, _feed_id: i64, _image_url: &str) -> Result<(), StoreError> {
            Ok(())
        }
        async fn update_feed_link(&self, _feed_id: i64, _link: &str) -> Result<(), StoreError> {
            Ok(())
        }
        async fn save_articles(
            &self,
            _feed_id: i64,
            _articles: &[ParsedArticle],
        ) -> Result<usize, StoreError> {
            Ok(0)
        }
        async fn get_recent_articles(
            &self,
            _feed_id: i64,
            _limit: i64,
        ) -> Result<Vec<Article>, StoreError> {
            if self.fail {
                return Err(StoreError::Other(sqlx::Error::PoolClosed));
            }
            Ok(self.articles.lock().await.clone())
        }
        async fn get_articles(
            &self,
            _feed_id: Option<i64>,
            _category: Option<&str>,
            _limit: i64,
            _offset: i64,
        ) -> Result<Vec<Article>, StoreError> {
            Ok(vec![])
        }
        async fn get_setting(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Ok(None)
        }
        async fn set_setting(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Ok(())
        }
        async fn increment_stat(&self, _name: &str, _delta: i64) -> Result<(), StoreError> {
            Ok(())
        }
        async fn get_total_stats(&self) -> Result<HashMap<String, i64>, StoreError> {
            Ok(HashMap::new())
        }
        async fn get_database_size_mb(&self) -> Result<f64, StoreError> {
            Ok(0.0)
        }
        async fn cleanup_article_contents_by_age(
            &self,
            _max_age_secs: i64,
        ) -> Result<usize, StoreError> {
            Ok(0)
        }
        async fn cleanup_old_read_articles(&self, _max_age_secs: i64) -> Result<usize, StoreError> {
            Ok(0)
        }
        async fn cleanup_old_unread_articles(
            &self,
            _max_age_secs: i64,
        ) -> Result<usize, StoreError> {
            Ok(0)
        }
        async fn cleanup_all_article_contents(&self) -> Result<usize, StoreError> {
            Ok(0)
        }
    }

    fn article(id: i64, published_at: i64) -> Article {
        Article {
            id,
            feed_id: 1,
            url: Arc::from(format!("https://example.com/{id}")),
            title: Arc::from("title"),
            published_at: Some(published_at),
            content: None,
            is_read: false,
            is_favorite: false,
            is_hidden: false,
            is_read_later: false,
            fetched_at: published_at,
        }
    }

    #[tokio::test]
    async fn fewer_than_two_articles_uses_default() {
        let store: Arc<dyn Store> = Arc::new(FakeStore {
            articles: Mutex::new(vec![article(1, 1000)]),
            fail: false,
        });
        assert_eq!(calculate_interval(&store, 1).await, DEFAULT_REFRESH_INTERVAL);
    }

    #[tokio::test]
    async fn store_error_uses_default() {
        let store: Arc<dyn Store> = Arc::new(FakeStore {
            articles: Mutex::new(vec![]),
            fail: true,
        });
        assert_eq!(calculate_interval(&store, 1).await, DEFAULT_REFRESH_INTERVAL);
    }

    #[tokio::test]
    async fn clamps_to_minimum() {
        // 60 second gaps -> 30s nyquist, clamped up to 5 min
        let arts = vec![article(1, 180), article(2, 120), article(3, 60), article(4, 0)];
        let store: Arc<dyn Store> = Arc::new(FakeStore {
            articles: Mutex::new(arts),
            fail: false,
        });
        assert_eq!(calculate_interval(&store, 1).await, MIN_REFRESH_INTERVAL);
    }

    #[tokio::test]
    async fn clamps_to_maximum_with_enough_history() {
        // 10 articles spaced 10 days apart: enough history (>= LOW_HISTORY_THRESHOLD)
        // to trust a long interval, so the Nyquist-halved median is allowed to
        // clamp up to MAX rather than being capped at the default.
        let arts: Vec<Article> = (0..10).map(|i| article(i + 1, (10 - i) * 10 * 86400)).collect();
        let store: Arc<dyn Store> = Arc::new(FakeStore {
            articles: Mutex::new(arts),
            fail: false,
        });
        assert_eq!(calculate_interval(&store, 1).await, MAX_REFRESH_INTERVAL);
    }

    #[tokio::test]
    async fn short_history_is_clamped_to_default_even_if_gaps_are_wide() {
        // Only 3 articles (< LOW_HISTORY_THRESHOLD) with 2-hour gaps: the raw
        // Nyquist-halved median (1 hour) exceeds the default, but short
        // history isn't trusted enough to justify polling less often than
        // DEFAULT_REFRESH_INTERVAL.
        let arts = vec![article(1, 14400), article(2, 7200), article(3, 0)];
        let store: Arc<dyn Store> = Arc::new(FakeStore {
            articles: Mutex::new(arts),
            fail: false,
        });
        assert_eq!(calculate_interval(&store, 1).await, DEFAULT_REFRESH_INTERVAL);
    }

    #[tokio::test]
    async fn median_gap_in_range() {
        // gaps: 3600, 3600, 3600 -> median 3600 -> nyquist 1800s (30min), within bounds
        let arts = vec![
            article(1, 10800),
            article(2, 7200),
            article(3, 3600),
            article(4, 0),
        ];
        let store: Arc<dyn Store> = Arc::new(FakeStore {
            articles: Mutex::new(arts),
            fail: false,
        });
        assert_eq!(
            calculate_interval(&store, 1).await,
            Duration::from_secs(1800)
        );
    }
}
