//! Feed Refresh & Maintenance Core: the orchestrator that owns the
//! scheduler, task manager, and cleanup manager and exposes the crate's
//! public API.

pub mod cleanup;
pub mod fetcher;
pub mod interval;
pub mod ports;
pub mod progress;
pub mod scheduler;
pub mod stagger;
pub mod task_manager;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::core::cleanup::CleanupManager;
use crate::core::ports::{Enricher, FeedParser, NoopEnricher, Store};
use crate::core::progress::ProgressSnapshot;
use crate::core::scheduler::Scheduler;
use crate::core::task_manager::TaskManager;
use crate::storage::StoreError;

/// Construction-time knobs for [`Core`]. Separate from [`crate::config::Config`]:
/// this is what the library needs to wire itself up, independent of how a
/// host binary loads its process configuration.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub user_agent: String,
    pub max_concurrent_refreshes: usize,
    pub shutdown_grace_period: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            user_agent: "feedkeeper/0.1".to_string(),
            max_concurrent_refreshes: 5,
            shutdown_grace_period: Duration::from_secs(30),
        }
    }
}

/// Owns every long-lived piece of the refresh/maintenance machinery and
/// exposes the public operations a host process drives.
pub struct Core {
    store: Arc<dyn Store>,
    task_manager: Arc<TaskManager>,
    scheduler: Arc<Scheduler>,
    cleanup_manager: Arc<CleanupManager>,
    scheduler_task: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
    cleanup_task: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
    shutdown_grace_period: Duration,
}

impl Core {
    pub fn new(
        store: Arc<dyn Store>,
        parser: Arc<dyn FeedParser>,
        enricher: Arc<dyn Enricher>,
        config: CoreConfig,
    ) -> Self {
        let task_manager = Arc::new(TaskManager::new(config.max_concurrent_refreshes));
        let scheduler = Arc::new(Scheduler::new(
            store.clone(),
            parser,
            enricher,
            task_manager.clone(),
            config.user_agent,
        ));
        let cleanup_manager = Arc::new(CleanupManager::new(store.clone(), task_manager.clone()));

        Self {
            store,
            task_manager,
            scheduler,
            cleanup_manager,
            scheduler_task: tokio::sync::Mutex::new(None),
            cleanup_task: tokio::sync::Mutex::new(None),
            shutdown_grace_period: config.shutdown_grace_period,
        }
    }

    /// Construct with the default no-op enricher.
    pub fn with_defaults(
        store: Arc<dyn Store>,
        parser: Arc<dyn FeedParser>,
        config: CoreConfig,
    ) -> Self {
        Self::new(store, parser, Arc::new(NoopEnricher), config)
    }

    /// Spawn the periodic scheduler sweep and cleanup retry loop as
    /// background tasks.
    pub async fn start(&self) {
        let scheduler = self.scheduler.clone();
        *self.scheduler_task.lock().await = Some(tokio::spawn(async move {
            scheduler.run().await;
        }));

        let cleanup = self.cleanup_manager.clone();
        *self.cleanup_task.lock().await = Some(tokio::spawn(async move {
            cleanup.run().await;
        }));

        tracing::info!("core started");
    }

    /// Stop background loops and wait (up to the configured grace period)
    /// for in-flight fetches to drain before cancelling them outright.
    pub async fn stop(&self) {
        self.scheduler.stop();
        self.cleanup_manager.stop();

        if let Some(handle) = self.scheduler_task.lock().await.take() {
            let _ = handle.await;
        }
        if let Some(handle) = self.cleanup_task.lock().await.take() {
            let _ = handle.await;
        }

        let drained = tokio::time::timeout(self.shutdown_grace_period, self.task_manager.wait()).await;
        if drained.is_err() {
            tracing::warn!("shutdown grace period elapsed, cancelling in-flight fetches");
            self.task_manager.shutdown();
        }

        tracing::info!("core stopped");
    }

    pub async fn refresh_all(&self) {
        self.scheduler.refresh_all().await;
    }

    pub async fn refresh_one(&self, feed_id: i64) {
        self.scheduler.refresh_one(feed_id).await;
    }

    pub async fn refresh_many(&self, feed_ids: &[i64]) {
        self.scheduler.refresh_many(feed_ids).await;
    }

    /// Request a cleanup without evaluating the gate inline; picked up by
    /// the cleanup manager's retry loop on its next tick.
    pub fn request_cleanup(&self) {
        self.cleanup_manager.request_cleanup();
    }

    pub async fn request_manual_cleanup(&self) {
        self.cleanup_manager.request_manual_cleanup().await;
    }

    /// Evaluate the cleanup gate immediately: evicts now if over the size
    /// cap and quiescent, otherwise marks the request pending.
    pub async fn check_size_and_cleanup(&self) {
        self.cleanup_manager.check_size_and_cleanup().await;
    }

    /// Snapshot of current task counters and per-feed error strings.
    pub async fn progress(&self) -> Result<ProgressSnapshot, StoreError> {
        let counters = self.task_manager.stats().await;

        let mut errors: HashMap<i64, String> = HashMap::new();
        for feed in self.store.get_feeds().await? {
            if let Some(err) = feed.last_error {
                errors.insert(feed.id, err);
            }
        }

        Ok(ProgressSnapshot::from_parts(counters, errors))
    }
}
