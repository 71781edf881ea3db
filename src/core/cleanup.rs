//! Cleanup Manager: layered, gated store-size maintenance.
//!
//! A periodic sweep (every [`RETRY_INTERVAL`]) checks whether the store
//! exceeds `max_cache_size_mb`; if so, and the store is quiescent
//! (`QueueTaskCount == PoolTaskCount == ArticleClickCount == 0` on the
//! [`TaskManager`] — the same counters the Progress Reporter reads, so a
//! running high-priority refresh blocks cleanup exactly as it blocks
//! `is_running` from going false), it evicts data in six ordered layers
//! until usage drops to `TARGET_FRACTION` of the cap. Manual cleanup
//! (`request_manual_cleanup`) bypasses both the quiescence gate and the size
//! check and clears all cached article content outright, since a user
//! invoking it explicitly isn't waiting on a size threshold — it still never
//! touches favorited or read-later articles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::core::ports::Store;
use crate::core::task_manager::TaskManager;

/// Eviction target: stop once usage falls to 80% of the configured cap.
const TARGET_FRACTION: f64 = 0.8;
/// How often the cleanup manager checks size when idle.
pub const RETRY_INTERVAL: Duration = Duration::from_secs(10 * 60);

const MAX_CACHE_SIZE_SETTING: &str = "max_cache_size_mb";
const DEFAULT_MAX_CACHE_SIZE_MB: f64 = 500.0;

/// §4.F layer ages, in execution order. Layers 1, 2, and 4 clear article
/// *content* (rows survive); layer 3 deletes read-article rows outright;
/// layer 5 clears all remaining content regardless of age; layer 6 is the
/// last resort, deleting unread rows.
const LAYER1_CONTENT_AGE_SECS: i64 = 7 * 86400;
const LAYER2_CONTENT_AGE_SECS: i64 = 3 * 86400;
const LAYER3_READ_METADATA_AGE_SECS: i64 = 30 * 86400;
const LAYER4_CONTENT_AGE_SECS: i64 = 86400;
const LAYER6_UNREAD_METADATA_AGE_SECS: i64 = 60 * 86400;

pub struct CleanupManager {
    store: Arc<dyn Store>,
    task_manager: Arc<TaskManager>,
    /// `CleanupState.pending_cleanup`: set by `request_cleanup` (or a failed
    /// gate check) and cleared once a gated attempt actually runs the
    /// layers or finds the store already under the cap.
    pending_cleanup: AtomicBool,
    cancel: CancellationToken,
}

impl CleanupManager {
    pub fn new(store: Arc<dyn Store>, task_manager: Arc<TaskManager>) -> Self {
        Self {
            store,
            task_manager,
            pending_cleanup: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        }
    }

    /// Whether a cleanup request is waiting for the gate to open.
    pub fn is_cleanup_pending(&self) -> bool {
        self.pending_cleanup.load(Ordering::Relaxed)
    }

    async fn is_quiescent(&self) -> bool {
        let stats = self.task_manager.stats().await;
        stats.queue_task_count == 0 && stats.pool_task_count == 0 && stats.article_click_count == 0
    }

    async fn max_cache_size_mb(&self) -> f64 {
        self.store
            .get_setting(MAX_CACHE_SIZE_SETTING)
            .await
            .ok()
            .flatten()
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(DEFAULT_MAX_CACHE_SIZE_MB)
    }

    async fn under_target(&self, target_mb: f64) -> bool {
        self.store.get_database_size_mb().await.unwrap_or(0.0) <= target_mb
    }

    /// Evict layer by layer, re-measuring size after each, until the store's
    /// reported size is at or below `target_mb` or every layer has run once.
    async fn run_layers(&self, target_mb: f64) {
        if self.under_target(target_mb).await {
            return;
        }
        match self.store.cleanup_article_contents_by_age(LAYER1_CONTENT_AGE_SECS).await {
            Ok(cleared) => tracing::info!(layer = 1, cleared, "cleanup: content >7d evicted"),
            Err(e) => tracing::warn!(layer = 1, error = %e, "cleanup: layer 1 failed"),
        }
        if self.under_target(target_mb).await {
            return;
        }

        match self.store.cleanup_article_contents_by_age(LAYER2_CONTENT_AGE_SECS).await {
            Ok(cleared) => tracing::info!(layer = 2, cleared, "cleanup: content >3d evicted"),
            Err(e) => tracing::warn!(layer = 2, error = %e, "cleanup: layer 2 failed"),
        }
        if self.under_target(target_mb).await {
            return;
        }

        // Layer 3: delete whole read-article rows older than 30 days,
        // excluding favorites/read-later.
        match self.store.cleanup_old_read_articles(LAYER3_READ_METADATA_AGE_SECS).await {
            Ok(removed) => tracing::info!(layer = 3, removed, "cleanup: read metadata >30d evicted"),
            Err(e) => tracing::warn!(layer = 3, error = %e, "cleanup: layer 3 failed"),
        }
        if self.under_target(target_mb).await {
            return;
        }

        match self.store.cleanup_article_contents_by_age(LAYER4_CONTENT_AGE_SECS).await {
            Ok(cleared) => tracing::info!(layer = 4, cleared, "cleanup: content >1d evicted"),
            Err(e) => tracing::warn!(layer = 4, error = %e, "cleanup: layer 4 failed"),
        }
        if self.under_target(target_mb).await {
            return;
        }

        // Layer 5: clear all remaining content regardless of age.
        match self.store.cleanup_all_article_contents().await {
            Ok(cleared) => tracing::info!(layer = 5, cleared, "cleanup: all content evicted"),
            Err(e) => tracing::warn!(layer = 5, error = %e, "cleanup: layer 5 failed"),
        }
        if self.under_target(target_mb).await {
            return;
        }

        // Layer 6: last resort — delete whole unread-article rows past the
        // oldest bound, excluding favorites/read-later.
        match self.store.cleanup_old_unread_articles(LAYER6_UNREAD_METADATA_AGE_SECS).await {
            Ok(removed) => tracing::info!(layer = 6, removed, "cleanup: unread metadata >60d evicted"),
            Err(e) => tracing::warn!(layer = 6, error = %e, "cleanup: layer 6 failed"),
        }
    }

    /// Mark a cleanup as desired without evaluating the gate inline; the
    /// retry loop (`run`) will attempt it on its next tick. Distinct from
    /// `check_size_and_cleanup`, which evaluates the gate immediately.
    pub fn request_cleanup(&self) {
        tracing::info!("cleanup: cleanup requested, deferred to next retry tick");
        self.pending_cleanup.store(true, Ordering::Relaxed);
    }

    /// Run one gated check now: if over the cap and quiescent, evict down to
    /// the target fraction; if the gate is closed, mark the request pending
    /// for the retry loop to pick up later.
    pub async fn check_size_and_cleanup(&self) {
        let cap = self.max_cache_size_mb().await;
        let size = self.store.get_database_size_mb().await.unwrap_or(0.0);
        if size <= cap {
            self.pending_cleanup.store(false, Ordering::Relaxed);
            return;
        }
        if !self.is_quiescent().await {
            tracing::debug!(size_mb = size, cap_mb = cap, "cleanup: over cap but not quiescent, deferring");
            self.pending_cleanup.store(true, Ordering::Relaxed);
            return;
        }
        tracing::info!(size_mb = size, cap_mb = cap, "cleanup: starting gated eviction");
        self.run_layers(cap * TARGET_FRACTION).await;
        self.pending_cleanup.store(false, Ordering::Relaxed);
    }

    /// Force an eviction pass regardless of the quiescence gate and current
    /// size. Clears cached content for every article outright (the same
    /// invariants as the layered sweep: favorites and read-later are never
    /// touched) rather than stopping early once under the size target,
    /// since a user invoking this explicitly wants the cache cleared now.
    pub async fn request_manual_cleanup(&self) {
        tracing::info!("cleanup: manual cleanup requested");
        match self.store.cleanup_all_article_contents().await {
            Ok(cleared) => tracing::info!(cleared, "cleanup: manual cleanup cleared content"),
            Err(e) => tracing::warn!(error = %e, "cleanup: manual cleanup failed"),
        }
    }

    /// Run the periodic retry loop until `stop()` is called.
    pub async fn run(&self) {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(RETRY_INTERVAL) => {
                    self.check_size_and_cleanup().await;
                }
                _ = self.cancel.cancelled() => break,
            }
        }
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}
