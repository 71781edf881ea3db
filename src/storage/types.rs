use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Store-specific errors with user-friendly messages.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another instance of feedkeeperd has locked the database.
    #[error("Another instance of feedkeeperd appears to be running. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed.
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error.
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl StoreError {
    /// Classify a raw sqlx error, mapping lock contention to `InstanceLocked`.
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5): database is locked
        // SQLITE_LOCKED (6): database table is locked
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
        {
            return StoreError::InstanceLocked;
        }

        StoreError::Other(err)
    }
}

// ============================================================================
// Enums
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    Success,
    Failed,
    Unknown,
}

impl UpdateStatus {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            UpdateStatus::Success => "success",
            UpdateStatus::Failed => "failed",
            UpdateStatus::Unknown => "unknown",
        }
    }

    pub(crate) fn from_str(s: &str) -> Self {
        match s {
            "success" => UpdateStatus::Success,
            "failed" => UpdateStatus::Failed,
            _ => UpdateStatus::Unknown,
        }
    }
}

// ============================================================================
// Helper / Wire Types
// ============================================================================

/// A freshly parsed article, prior to persistence. `guid` is the core's
/// internal dedup key (may be synthesized by the parser when the feed omits
/// a stable id); `url` is the public identity used by the store's
/// uniqueness constraint when present.
#[derive(Debug, Clone)]
pub struct ParsedArticle {
    pub guid: String,
    pub title: String,
    pub url: Option<String>,
    pub published: Option<i64>,
    pub content: Option<String>,
}

/// Internal row type for article queries (sqlx `FromRow`). Converts to
/// [`Article`] via `into_article`.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ArticleDbRow {
    pub id: i64,
    pub feed_id: i64,
    pub url: String,
    pub title: String,
    pub published_at: Option<i64>,
    pub content: Option<String>,
    pub is_read: bool,
    pub is_favorite: bool,
    pub is_hidden: bool,
    pub is_read_later: bool,
    pub fetched_at: i64,
}

impl ArticleDbRow {
    pub(crate) fn into_article(self) -> Article {
        Article {
            id: self.id,
            feed_id: self.feed_id,
            url: Arc::from(self.url),
            title: Arc::from(self.title),
            published_at: self.published_at,
            content: self.content.map(Arc::from),
            is_read: self.is_read,
            is_favorite: self.is_favorite,
            is_hidden: self.is_hidden,
            is_read_later: self.is_read_later,
            fetched_at: self.fetched_at,
        }
    }
}

/// Internal row type for feed queries (sqlx `FromRow`).
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct FeedDbRow {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub html_url: Option<String>,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub last_updated: Option<i64>,
    pub last_error: Option<String>,
    pub last_update_status: String,
    pub proxy: Option<String>,
    pub is_freshrss_source: bool,
    pub discovery_completed: bool,
    pub custom_script: Option<String>,
    pub xpath_rules: Option<String>,
}

impl FeedDbRow {
    pub(crate) fn into_feed(self) -> Feed {
        Feed {
            id: self.id,
            title: Arc::from(self.title),
            url: self.url,
            html_url: self.html_url,
            image_url: self.image_url,
            category: self.category,
            last_updated: self.last_updated,
            last_error: self.last_error,
            last_update_status: UpdateStatus::from_str(&self.last_update_status),
            proxy: self.proxy,
            is_freshrss_source: self.is_freshrss_source,
            discovery_completed: self.discovery_completed,
            custom_script: self.custom_script,
            xpath_rules: self.xpath_rules,
        }
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// Feed data from the store.
///
/// `title` uses `Arc<str>` for cheap cloning across the scheduler's
/// submitted closures.
#[derive(Debug, Clone)]
pub struct Feed {
    pub id: i64,
    pub title: Arc<str>,
    pub url: String,
    pub html_url: Option<String>,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub last_updated: Option<i64>,
    pub last_error: Option<String>,
    pub last_update_status: UpdateStatus,
    pub proxy: Option<String>,
    pub is_freshrss_source: bool,
    pub discovery_completed: bool,
    pub custom_script: Option<String>,
    pub xpath_rules: Option<String>,
}

/// Article data from the store.
///
/// String fields use `Arc<str>` for cheap cloning, matching `Feed::title`.
#[derive(Debug, Clone)]
pub struct Article {
    pub id: i64,
    pub feed_id: i64,
    pub url: Arc<str>,
    pub title: Arc<str>,
    pub published_at: Option<i64>,
    pub content: Option<Arc<str>>,
    pub is_read: bool,
    pub is_favorite: bool,
    pub is_hidden: bool,
    pub is_read_later: bool,
    pub fetched_at: i64,
}
