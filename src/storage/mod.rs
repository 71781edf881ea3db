mod articles;
mod cleanup_ops;
mod feeds;
mod schema;
mod settings;
mod sqlite_store;
mod stats;
mod types;

pub use schema::Database;
pub use types::{Article, Feed, ParsedArticle, StoreError, UpdateStatus};
