//! Progress Reporter: a pull-only snapshot of scheduler activity.
//!
//! `Progress` never polls internally — callers ask for a snapshot when they
//! want one. Error messages are keyed by feed id so a caller can show
//! "N feeds failing" without re-querying the store.

use std::collections::HashMap;

use serde::Serialize;

use crate::core::task_manager::TaskCounters;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub is_running: bool,
    pub counters: TaskCounters,
    pub errors: HashMap<i64, String>,
}

impl ProgressSnapshot {
    /// `is_running` is the sum of all three task counters being nonzero, per
    /// §4.G — not scheduler state, so a high-priority `RefreshOne` running
    /// while the scheduler is otherwise idle still reports as running.
    pub fn from_parts(counters: TaskCounters, errors: HashMap<i64, String>) -> Self {
        let is_running = counters.queue_task_count + counters.pool_task_count + counters.article_click_count > 0;
        Self {
            is_running,
            counters,
            errors,
        }
    }
}
