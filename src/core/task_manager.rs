//! Task Manager: bounded two-priority worker pool with atomic counter
//! snapshots.
//!
//! High-priority jobs (ad-hoc, user-requested refreshes) and normal-priority
//! jobs (the periodic sweep) each draw from their own `tokio::sync::Semaphore`,
//! which grants permits FIFO within a class. The high-priority pool is sized
//! `max(2 * normal, 4)` so a user-triggered refresh is never starved behind a
//! long periodic sweep.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Normal,
    High,
}

/// Point-in-time view of task counts, split by priority class per §3:
/// `queue_task_count`/`pool_task_count` cover normal-priority jobs waiting
/// and actually executing; `article_click_count` covers high-priority jobs
/// (foreground, user-triggered) executing. Keeping these separate lets a
/// caller see background sweep activity without it masking (or being masked
/// by) foreground refreshes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct TaskCounters {
    pub queue_task_count: usize,
    pub pool_task_count: usize,
    pub article_click_count: usize,
    pub completed: u64,
}

struct Counters {
    queue_task_count: usize,
    pool_task_count: usize,
    article_click_count: usize,
    completed: u64,
}

pub struct TaskManager {
    normal_permits: Arc<Semaphore>,
    high_permits: Arc<Semaphore>,
    total_normal: usize,
    total_high: usize,
    counters: Arc<Mutex<Counters>>,
    cancel: CancellationToken,
}

impl TaskManager {
    pub fn new(max_normal_concurrency: usize) -> Self {
        let normal = max_normal_concurrency.max(1);
        let high = (2 * normal).max(4);
        Self {
            normal_permits: Arc::new(Semaphore::new(normal)),
            high_permits: Arc::new(Semaphore::new(high)),
            total_normal: normal,
            total_high: high,
            counters: Arc::new(Mutex::new(Counters {
                queue_task_count: 0,
                pool_task_count: 0,
                article_click_count: 0,
                completed: 0,
            })),
            cancel: CancellationToken::new(),
        }
    }

    /// Submit `job` at `priority`. The returned handle completes once the
    /// job has run (or been cancelled by `Shutdown`).
    pub fn submit<F, Fut>(&self, priority: Priority, job: F) -> JoinHandle<()>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let permits = match priority {
            Priority::Normal => self.normal_permits.clone(),
            Priority::High => self.high_permits.clone(),
        };
        let counters = self.counters.clone();
        let cancel = self.cancel.clone();

        {
            let counters = counters.clone();
            tokio::spawn(async move {
                let mut c = counters.lock().await;
                match priority {
                    Priority::Normal => c.queue_task_count += 1,
                    Priority::High => c.article_click_count += 1,
                }
            });
        }

        tokio::spawn(async move {
            let permit = tokio::select! {
                p = permits.acquire_owned() => p,
                _ = cancel.cancelled() => {
                    let mut c = counters.lock().await;
                    match priority {
                        Priority::Normal => c.queue_task_count = c.queue_task_count.saturating_sub(1),
                        Priority::High => c.article_click_count = c.article_click_count.saturating_sub(1),
                    }
                    return;
                }
            };
            let Ok(permit) = permit else { return };

            if priority == Priority::Normal {
                let mut c = counters.lock().await;
                c.queue_task_count = c.queue_task_count.saturating_sub(1);
                c.pool_task_count += 1;
            }

            tokio::select! {
                _ = job() => {}
                _ = cancel.cancelled() => {}
            }

            drop(permit);
            let mut c = counters.lock().await;
            match priority {
                Priority::Normal => c.pool_task_count = c.pool_task_count.saturating_sub(1),
                Priority::High => c.article_click_count = c.article_click_count.saturating_sub(1),
            }
            c.completed += 1;
        })
    }

    /// Atomic snapshot of queued/running/completed counts.
    pub async fn stats(&self) -> TaskCounters {
        let c = self.counters.lock().await;
        TaskCounters {
            queue_task_count: c.queue_task_count,
            pool_task_count: c.pool_task_count,
            article_click_count: c.article_click_count,
            completed: c.completed,
        }
    }

    /// Block until both permit pools are fully available again, i.e. no
    /// task currently holds a permit.
    pub async fn wait(&self) {
        let normal = self.normal_permits.acquire_many(self.total_normal as u32);
        let high = self.high_permits.acquire_many(self.total_high as u32);
        let _ = tokio::join!(normal, high);
    }

    /// Cancel every in-flight and queued job. Idempotent.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Temporarily shrink the normal-priority pool to `target` permits
    /// (never above the configured maximum) for the lifetime of the
    /// returned guard, per §4.D's large-sweep concurrency reduction. Permits
    /// already in use are unaffected; this only throttles new admissions for
    /// the sweep driving it.
    pub fn limit_for_sweep(self: &Arc<Self>, target: usize) -> SweepConcurrencyGuard {
        let target = target.clamp(1, self.total_normal);
        let reduced_by = self.total_normal - target;
        if reduced_by > 0 {
            self.normal_permits.forget_permits(reduced_by);
        }
        SweepConcurrencyGuard {
            manager: self.clone(),
            restored_by: reduced_by,
        }
    }
}

/// Restores the normal-priority pool to its configured size when dropped.
pub struct SweepConcurrencyGuard {
    manager: Arc<TaskManager>,
    restored_by: usize,
}

impl Drop for SweepConcurrencyGuard {
    fn drop(&mut self) {
        if self.restored_by > 0 {
            self.manager.normal_permits.add_permits(self.restored_by);
        }
    }
}
