//! Refresh Scheduler: periodic + ad-hoc refresh orchestration.
//!
//! The periodic driver (`run`) wakes every `update_interval` (a
//! `Store`-resident setting) and, per §4.E, computes a per-feed due-time —
//! `last_updated + IntervalCalculator(feed) + Stagger(feed.id, N)` — only
//! submitting feeds whose due-time has passed. `refresh_all`, by contrast,
//! is the explicit "refresh everything now" entry point: it ignores due-time
//! and submits every eligible feed, staggered across the window. Ad-hoc
//! `RefreshOne`/`RefreshMany` calls are deduplicated against the feeds
//! currently queued so a double-click doesn't submit the same feed twice.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::core::fetcher::{self, fetch_one};
use crate::core::interval;
use crate::core::ports::{Enricher, FeedParser, Store};
use crate::core::stagger::stagger_delay;
use crate::core::task_manager::{Priority, TaskManager};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Sweeping,
    Stopping,
}

pub struct Scheduler {
    store: Arc<dyn Store>,
    parser: Arc<dyn FeedParser>,
    enricher: Arc<dyn Enricher>,
    task_manager: Arc<TaskManager>,
    user_agent: String,
    queued_feeds: Arc<Mutex<HashSet<i64>>>,
    state: Arc<Mutex<SchedulerState>>,
    cancel: CancellationToken,
}

const UPDATE_INTERVAL_SETTING: &str = "update_interval";
const MAX_CONCURRENT_REFRESHES_SETTING: &str = "max_concurrent_refreshes";
const LAST_GLOBAL_REFRESH_SETTING: &str = "last_global_refresh";

impl Scheduler {
    pub fn new(
        store: Arc<dyn Store>,
        parser: Arc<dyn FeedParser>,
        enricher: Arc<dyn Enricher>,
        task_manager: Arc<TaskManager>,
        user_agent: String,
    ) -> Self {
        Self {
            store,
            parser,
            enricher,
            task_manager,
            user_agent,
            queued_feeds: Arc::new(Mutex::new(HashSet::new())),
            state: Arc::new(Mutex::new(SchedulerState::Idle)),
            cancel: CancellationToken::new(),
        }
    }

    pub async fn state(&self) -> SchedulerState {
        *self.state.lock().await
    }

    /// Submit every eligible feed (not `is_freshrss_source`) at normal
    /// priority, staggered across the default 5-minute window, and wait for
    /// every fetch in the sweep to finish before returning. Unlike the
    /// periodic driver, this ignores due-time: a full sweep supersedes the
    /// schedule by design.
    pub async fn refresh_all(&self) {
        let feeds = match self.store.get_feeds().await {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(error = %e, "scheduler: refresh_all failed to list feeds");
                return;
            }
        };
        let any_feeds_exist = !feeds.is_empty();
        let eligible: Vec<_> = feeds.into_iter().filter(|f| !f.is_freshrss_source).collect();
        let total = eligible.len() as i64;

        let (configured, explicit) = self.configured_concurrency().await;
        let target = fetcher::sweep_concurrency(configured, eligible.len(), explicit);
        let _guard = self.task_manager.limit_for_sweep(target);

        *self.state.lock().await = SchedulerState::Sweeping;
        let mut handles = Vec::with_capacity(eligible.len());
        for feed in eligible {
            let delay = stagger_delay(feed.id, total);
            if let Some(handle) = self.submit_feed(feed.id, Priority::Normal, delay).await {
                handles.push(handle);
            }
        }
        futures::future::join_all(handles).await;
        *self.state.lock().await = SchedulerState::Idle;

        self.record_sweep(any_feeds_exist).await;
    }

    /// Periodic driver's sweep: unlike `refresh_all`, only submits feeds
    /// whose due-time (`last_updated + IntervalCalculator + Stagger`) has
    /// passed. A feed with no `last_updated` (never fetched) is always due.
    async fn refresh_due_feeds(&self) {
        let feeds = match self.store.get_feeds().await {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(error = %e, "scheduler: periodic sweep failed to list feeds");
                return;
            }
        };
        let any_feeds_exist = !feeds.is_empty();
        let eligible: Vec<_> = feeds.into_iter().filter(|f| !f.is_freshrss_source).collect();
        let total = eligible.len() as i64;
        let now = chrono::Utc::now().timestamp();

        let mut due_ids = Vec::new();
        for feed in &eligible {
            let Some(last_updated) = feed.last_updated else {
                due_ids.push(feed.id);
                continue;
            };
            let refresh_interval = interval::calculate_interval(&self.store, feed.id).await;
            let stagger = stagger_delay(feed.id, total);
            let due_at = last_updated + refresh_interval.as_secs() as i64 + stagger.as_secs() as i64;
            if due_at <= now {
                due_ids.push(feed.id);
            }
        }

        if due_ids.is_empty() {
            tracing::debug!("scheduler: periodic tick found no due feeds");
        } else {
            let (configured, explicit) = self.configured_concurrency().await;
            let target = fetcher::sweep_concurrency(configured, due_ids.len(), explicit);
            let _guard = self.task_manager.limit_for_sweep(target);

            *self.state.lock().await = SchedulerState::Sweeping;
            let mut handles = Vec::with_capacity(due_ids.len());
            for feed_id in due_ids {
                if let Some(handle) = self.submit_feed(feed_id, Priority::Normal, Duration::ZERO).await {
                    handles.push(handle);
                }
            }
            futures::future::join_all(handles).await;
            *self.state.lock().await = SchedulerState::Idle;
        }

        self.record_sweep(any_feeds_exist).await;
    }

    /// Read `max_concurrent_refreshes` from settings; returns the configured
    /// value (or the default) plus whether it was actually present.
    async fn configured_concurrency(&self) -> (usize, bool) {
        match self.store.get_setting(MAX_CONCURRENT_REFRESHES_SETTING).await {
            Ok(Some(v)) => match v.parse::<usize>() {
                Ok(n) => (n, true),
                Err(_) => (fetcher::DEFAULT_MAX_CONCURRENT_REFRESHES, false),
            },
            _ => (fetcher::DEFAULT_MAX_CONCURRENT_REFRESHES, false),
        }
    }

    /// Record that a sweep happened regardless of how many feeds were
    /// actually due/submitted: `feed_refresh` +1 and `last_global_refresh`
    /// advanced, unless the store has no feeds at all (§4.E, Property 8).
    async fn record_sweep(&self, any_feeds_exist: bool) {
        if !any_feeds_exist {
            return;
        }
        if let Err(e) = self.store.increment_stat("feed_refresh", 1).await {
            tracing::warn!(error = %e, "scheduler: failed to record feed_refresh stat");
        }
        let now = chrono::Utc::now().to_rfc3339();
        if let Err(e) = self.store.set_setting(LAST_GLOBAL_REFRESH_SETTING, &now).await {
            tracing::warn!(error = %e, "scheduler: failed to record last_global_refresh");
        }
    }

    /// Submit a single feed at high priority, immediately (no stagger).
    /// No-op if the feed is already queued. Returns once the fetch has
    /// actually completed rather than merely been enqueued.
    pub async fn refresh_one(&self, feed_id: i64) {
        if let Some(handle) = self.submit_feed(feed_id, Priority::High, Duration::ZERO).await {
            let _ = handle.await;
        }
    }

    /// Submit several feeds at high priority, deduplicated, waiting for all
    /// of them to complete.
    pub async fn refresh_many(&self, feed_ids: &[i64]) {
        let mut handles = Vec::with_capacity(feed_ids.len());
        for &feed_id in feed_ids {
            if let Some(handle) = self.submit_feed(feed_id, Priority::High, Duration::ZERO).await {
                handles.push(handle);
            }
        }
        futures::future::join_all(handles).await;
    }

    /// Enqueue a feed fetch, returning its `JoinHandle` unless the feed is
    /// already queued (in which case this is a no-op).
    async fn submit_feed(
        &self,
        feed_id: i64,
        priority: Priority,
        delay: Duration,
    ) -> Option<tokio::task::JoinHandle<()>> {
        {
            let mut queued = self.queued_feeds.lock().await;
            if !queued.insert(feed_id) {
                tracing::debug!(feed_id, "scheduler: feed already queued, skipping");
                return None;
            }
        }

        let store = self.store.clone();
        let parser = self.parser.clone();
        let enricher = self.enricher.clone();
        let user_agent = self.user_agent.clone();
        let queued_feeds = self.queued_feeds.clone();

        Some(self.task_manager.submit(priority, move || async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let feed = match store.get_feed_by_id(feed_id).await {
                Ok(Some(f)) => f,
                Ok(None) => {
                    queued_feeds.lock().await.remove(&feed_id);
                    return;
                }
                Err(e) => {
                    tracing::warn!(feed_id, error = %e, "scheduler: failed to load feed");
                    queued_feeds.lock().await.remove(&feed_id);
                    return;
                }
            };

            if let Err(e) =
                fetch_one(&store, &parser, &enricher, &user_agent, &feed, priority).await
            {
                tracing::warn!(feed_id, error = %e, "scheduler: fetch failed");
            }

            queued_feeds.lock().await.remove(&feed_id);
        });
    }

    /// Run the periodic sweep loop until `stop()` is called. Intended to be
    /// spawned as a background task by `Core::start`. A `0` update interval
    /// disables the loop entirely (it only waits on cancellation) rather than
    /// busy-looping on an immediate tick.
    pub async fn run(&self) {
        loop {
            let configured = self
                .store
                .get_setting(UPDATE_INTERVAL_SETTING)
                .await
                .ok()
                .flatten()
                .and_then(|v| v.parse::<u64>().ok());

            if configured == Some(0) {
                self.cancel.cancelled().await;
                *self.state.lock().await = SchedulerState::Stopping;
                break;
            }

            let interval = configured
                .map(Duration::from_secs)
                .unwrap_or(crate::core::interval::DEFAULT_REFRESH_INTERVAL);

            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    self.refresh_due_feeds().await;
                }
                _ = self.cancel.cancelled() => {
                    *self.state.lock().await = SchedulerState::Stopping;
                    break;
                }
            }
        }
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}
