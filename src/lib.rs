//! Feed refresh & maintenance core.
//!
//! This crate implements the scheduling, concurrency, and cleanup machinery
//! that keeps a personal feed-aggregation store up to date: per-feed interval
//! calculation, staggered batch refresh, a two-tier priority task manager,
//! and layered size-based eviction. Feed parsing, persistence, and
//! enrichment are consumed through the [`core::ports`] traits; a SQLite-backed
//! `Store` and an RSS/Atom `FeedParser` are provided as the default adapters.

pub mod config;
pub mod core;
pub mod feed;
pub mod storage;

pub use crate::core::{Core, CoreConfig};
