//! RSS/Atom feed parsing, the default [`crate::core::ports::FeedParser`]
//! adapter.

mod parser;

pub use parser::{parse_feed, RssAtomParser};
