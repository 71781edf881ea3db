//! Fetcher: the single-feed fetch → diff → persist → enrich pipeline.
//!
//! Steps: (1) resolve an HTTP client for the feed (proxy, timeout), (2) fetch
//! the feed body, (3) parse it via the `FeedParser` port; on success clear
//! the feed's error state and backfill `image_url`/`link` if they were
//! previously empty, (4) persist new/updated articles via `Store`, (5) run
//! each new article through the `Enricher` port, updating statistics along
//! the way. `feed_refresh`/`last_global_refresh` bookkeeping is sweep-level,
//! not per-feed, and lives in `core::scheduler`.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::core::ports::{Enricher, FeedParser, Store};
use crate::core::task_manager::Priority;
use crate::storage::Feed;

/// Default `max_concurrent_refreshes` when the setting is absent.
pub const DEFAULT_MAX_CONCURRENT_REFRESHES: usize = 5;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("feed parse failed: {0}")]
    Parse(anyhow::Error),

    #[error("store error: {0}")]
    Store(#[from] crate::storage::StoreError),

    #[error("invalid proxy URL: {0}")]
    InvalidProxy(String),
}

/// Timeout applied to a high-priority (user-requested) fetch.
pub const HIGH_PRIORITY_TIMEOUT: Duration = Duration::from_secs(15);
/// Timeout applied to a normal-priority (periodic sweep) fetch.
pub const NORMAL_PRIORITY_TIMEOUT: Duration = Duration::from_secs(60);

/// Resolved HTTP client parameters for a given feed, derived purely from
/// feed/settings data so it is unit testable without a network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpClientSpec {
    pub proxy: Option<String>,
    pub timeout: Duration,
}

/// Pure function: `(feed, priority) -> HttpClientSpec`.
pub fn resolve_client_spec(feed: &Feed, priority: Priority) -> HttpClientSpec {
    let timeout = match priority {
        Priority::High => HIGH_PRIORITY_TIMEOUT,
        Priority::Normal => NORMAL_PRIORITY_TIMEOUT,
    };
    HttpClientSpec {
        proxy: feed.proxy.clone(),
        timeout,
    }
}

fn build_client(spec: &HttpClientSpec, user_agent: &str) -> Result<reqwest::Client, FetchError> {
    let mut builder = reqwest::Client::builder()
        .user_agent(user_agent.to_string())
        .timeout(spec.timeout);

    if let Some(proxy_url) = &spec.proxy {
        let parsed = url::Url::parse(proxy_url)
            .map_err(|_| FetchError::InvalidProxy(proxy_url.clone()))?;
        let proxy = reqwest::Proxy::all(parsed.as_str())
            .map_err(|_| FetchError::InvalidProxy(proxy_url.clone()))?;
        builder = builder.proxy(proxy);
    }

    builder.build().map_err(FetchError::Http)
}

/// §4.D concurrency-limit calculation, consumed by the scheduler when
/// constructing a sweep. `configured` is `max_concurrent_refreshes` (already
/// clamped to `[1, 20]` by the caller); `explicit` is whether that setting
/// was actually present in the store (vs defaulted). Large feed sets get
/// reduced regardless of `explicit` to avoid connection exhaustion; the
/// `N > 10` reduction only kicks in when the operator never configured a
/// value themselves.
pub fn sweep_concurrency(configured: usize, feed_count: usize, explicit: bool) -> usize {
    let configured = configured.clamp(1, 20);
    if feed_count > 50 {
        configured.min(3)
    } else if feed_count > 20 {
        configured.min(5)
    } else if feed_count > 10 && !explicit {
        configured.min(3)
    } else {
        configured
    }
}

/// Fetch, parse, diff, persist, and enrich a single feed. `is_freshrss_source`
/// feeds are the caller's responsibility to filter out before calling this
/// (the scheduler never submits them).
// TODO: consult feed.last_updated and send If-Modified-Since once FeedParser
// can report "not modified" instead of requiring a parseable body.
pub async fn fetch_one(
    store: &Arc<dyn Store>,
    parser: &Arc<dyn FeedParser>,
    enricher: &Arc<dyn Enricher>,
    user_agent: &str,
    feed: &Feed,
    priority: Priority,
) -> Result<usize, FetchError> {
    let spec = resolve_client_spec(feed, priority);
    let client = build_client(&spec, user_agent)?;

    let fetch_result = client.get(&feed.url).send().await.and_then(|r| r.error_for_status());

    let bytes = match fetch_result {
        Ok(resp) => match resp.bytes().await {
            Ok(b) => b,
            Err(e) => {
                store.update_feed_error(feed.id, Some(&e.to_string())).await?;
                tracing::warn!(feed_id = feed.id, error = %e, "fetch: failed to read body");
                return Err(FetchError::Http(e));
            }
        },
        Err(e) => {
            store.update_feed_error(feed.id, Some(&e.to_string())).await?;
            tracing::warn!(feed_id = feed.id, error = %e, "fetch: request failed");
            return Err(FetchError::Http(e));
        }
    };

    let parsed = match parser.parse(&bytes).await {
        Ok(parsed) => parsed,
        Err(e) => {
            store.update_feed_error(feed.id, Some(&e.to_string())).await?;
            tracing::warn!(feed_id = feed.id, error = %e, "fetch: parse failed");
            return Err(FetchError::Parse(e));
        }
    };

    store.update_feed_error(feed.id, None).await?;

    if feed.image_url.is_none() {
        if let Some(image_url) = parsed.image_url.as_deref() {
            store.update_feed_image(feed.id, image_url).await?;
        }
    }
    if feed.html_url.is_none() {
        if let Some(link) = parsed.link.as_deref() {
            store.update_feed_link(feed.id, link).await?;
        }
    }

    let mut enriched = Vec::with_capacity(parsed.articles.len());
    for article in parsed.articles {
        match enricher.enrich(article.clone()).await {
            Ok(e) => enriched.push(e),
            Err(err) => {
                tracing::warn!(feed_id = feed.id, error = %err, "fetch: enrichment failed, keeping raw article");
                store.increment_stat("enrich_failure", 1).await?;
                enriched.push(article);
            }
        }
    }

    let inserted = store.save_articles(feed.id, &enriched).await?;
    if inserted > 0 {
        store.increment_stat("article_saved", inserted as i64).await?;
    }

    tracing::info!(feed_id = feed.id, new_articles = inserted, "feed refreshed");
    Ok(inserted)
}
