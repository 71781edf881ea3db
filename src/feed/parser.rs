use async_trait::async_trait;
use feed_rs::parser;
use sha2::{Digest, Sha256};

use crate::core::ports::{FeedParser as FeedParserPort, ParsedFeed};
use crate::storage::ParsedArticle;

/// Default `FeedParser` port implementation, wrapping `feed-rs` for RSS/Atom.
pub struct RssAtomParser;

#[async_trait]
impl FeedParserPort for RssAtomParser {
    async fn parse(&self, bytes: &[u8]) -> Result<ParsedFeed, anyhow::Error> {
        parse_feed(bytes)
    }
}

pub fn parse_feed(bytes: &[u8]) -> Result<ParsedFeed, anyhow::Error> {
    let feed = parser::parse(bytes)?;

    let image_url = feed.logo.as_ref().map(|logo| logo.uri.clone());
    let link = feed.links.first().map(|l| l.href.clone());

    let articles: Vec<ParsedArticle> = feed
        .entries
        .into_iter()
        .map(|entry| {
            let url = entry.links.first().map(|l| l.href.clone());
            let published = entry.published.or(entry.updated).map(|dt| dt.timestamp());
            let content = entry
                .content
                .and_then(|c| c.body)
                .or_else(|| entry.summary.map(|s| s.content));
            let title = entry
                .title
                .map(|t| t.content)
                .unwrap_or_else(|| "Untitled".to_string());

            let existing_id = if entry.id.is_empty() {
                None
            } else {
                Some(entry.id.as_str())
            };
            let guid = generate_guid(existing_id, url.as_deref(), &title, published);

            ParsedArticle {
                guid,
                title,
                url,
                published,
                content,
            }
        })
        .collect();

    Ok(ParsedFeed { articles, image_url, link })
}

/// Stable per-article key: the feed's own entry id when present and
/// non-empty, otherwise a hash of url|title|published. Real-world feeds
/// sometimes omit ids on individual items, but `save_articles` needs a
/// stable key to diff against on every refresh.
fn generate_guid(
    existing: Option<&str>,
    url: Option<&str>,
    title: &str,
    published: Option<i64>,
) -> String {
    if let Some(guid) = existing {
        let trimmed = guid.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let input = format!(
        "{}|{}|{}",
        url.unwrap_or(""),
        title,
        published.map(|p| p.to_string()).unwrap_or_default()
    );
    let hash = Sha256::digest(input.as_bytes());
    format!("{:x}", hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guid_prefers_existing_id() {
        let guid = generate_guid(Some("entry-1"), Some("https://x.example/a"), "Title", Some(1));
        assert_eq!(guid, "entry-1");
    }

    #[test]
    fn guid_falls_back_to_hash_when_id_empty() {
        let guid = generate_guid(Some("   "), Some("https://x.example/a"), "Title", Some(1));
        assert_eq!(guid.len(), 64);
    }

    #[test]
    fn guid_is_deterministic() {
        let a = generate_guid(None, Some("https://x.example/a"), "Title", Some(1));
        let b = generate_guid(None, Some("https://x.example/a"), "Title", Some(1));
        assert_eq!(a, b);
    }

    #[test]
    fn guid_differs_for_different_inputs() {
        let a = generate_guid(None, Some("https://x.example/a"), "Title", Some(1));
        let b = generate_guid(None, Some("https://x.example/b"), "Title", Some(1));
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_xml_is_rejected() {
        let result = parse_feed(b"not a feed at all");
        assert!(result.is_err());
    }

    #[test]
    fn parses_minimal_rss() {
        let xml = br#"<?xml version="1.0"?>
        <rss version="2.0">
          <channel>
            <title>Example</title>
            <item>
              <title>Hello</title>
              <link>https://example.com/hello</link>
              <guid>hello-1</guid>
            </item>
          </channel>
        </rss>"#;
        let parsed = parse_feed(xml).unwrap();
        assert_eq!(parsed.articles.len(), 1);
        assert_eq!(parsed.articles[0].guid, "hello-1");
        assert_eq!(parsed.articles[0].title, "Hello");
        assert_eq!(parsed.articles[0].url.as_deref(), Some("https://example.com/hello"));
    }

    #[test]
    fn feed_level_logo_and_link_are_surfaced() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
        <feed xmlns="http://www.w3.org/2005/Atom">
          <title>Example</title>
          <link href="https://example.com/"/>
          <logo>https://example.com/logo.png</logo>
          <id>urn:example</id>
          <entry>
            <title>Hello</title>
            <link href="https://example.com/hello"/>
            <id>hello-1</id>
          </entry>
        </feed>"#;
        let parsed = parse_feed(xml).unwrap();
        assert_eq!(parsed.image_url.as_deref(), Some("https://example.com/logo.png"));
        assert_eq!(parsed.link.as_deref(), Some("https://example.com/"));
    }
}
