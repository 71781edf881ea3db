//! End-to-end tests for the refresh/maintenance core, covering the testable
//! scenarios from spec.md §8 against a real in-memory SQLite store and a
//! fake `FeedParser`/`Enricher`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use feedkeeper::core::ports::{Enricher, FeedParser, NoopEnricher, ParsedFeed};
use feedkeeper::core::{Core, CoreConfig};
use feedkeeper::storage::{Database, ParsedArticle};

struct FakeParser {
    articles: Vec<ParsedArticle>,
}

#[async_trait]
impl FeedParser for FakeParser {
    async fn parse(&self, _bytes: &[u8]) -> Result<ParsedFeed, anyhow::Error> {
        Ok(ParsedFeed {
            articles: self.articles.clone(),
            image_url: None,
            link: None,
        })
    }
}

struct CountingEnricher {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Enricher for CountingEnricher {
    async fn enrich(&self, article: ParsedArticle) -> Result<ParsedArticle, anyhow::Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(article)
    }
}

fn article(guid: &str) -> ParsedArticle {
    ParsedArticle {
        guid: guid.to_string(),
        title: format!("Article {guid}"),
        url: Some(format!("https://example.com/{guid}")),
        published: Some(1700000000),
        content: Some("body".to_string()),
    }
}

async fn test_db() -> Arc<Database> {
    Arc::new(Database::open(":memory:").await.unwrap())
}

// S1: a freshly added feed with no history refreshes via `refresh_one` and
// its articles are persisted, enriched, and awaited to completion (not
// merely enqueued) by the time the call returns.
#[tokio::test]
async fn s1_fresh_feed_refreshes_and_persists_articles() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<rss/>"))
        .mount(&mock_server)
        .await;

    let db = test_db().await;
    let feed_id = db.add_feed(&format!("{}/feed.xml", mock_server.uri()), "Feed").await.unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let core = Core::new(
        db.clone(),
        Arc::new(FakeParser {
            articles: vec![article("a1"), article("a2")],
        }),
        Arc::new(CountingEnricher { calls: calls.clone() }),
        CoreConfig {
            user_agent: "test-agent/1.0".to_string(),
            max_concurrent_refreshes: 2,
            shutdown_grace_period: Duration::from_secs(1),
        },
    );

    core.refresh_one(feed_id).await;

    let articles = db.get_recent_articles(feed_id, 10).await.unwrap();
    assert_eq!(articles.len(), 2, "refresh_one must have completed the fetch before returning");
    assert_eq!(calls.load(Ordering::SeqCst), 2, "each parsed article should pass through the enricher");
}

// S2: re-saving the same articles on a later refresh does not duplicate
// rows, and preserves any read/favorite state set in between.
#[tokio::test]
async fn s2_repeat_refresh_is_idempotent_and_preserves_flags() {
    let db = test_db().await;
    let feed_id = db.add_feed("https://example.com/feed.xml", "Feed").await.unwrap();

    db.save_articles(feed_id, &[article("a1")]).await.unwrap();
    let articles = db.get_recent_articles(feed_id, 10).await.unwrap();
    let article_id = articles[0].id;

    sqlx_mark_favorite(&db, article_id).await;

    let inserted = db.save_articles(feed_id, &[article("a1")]).await.unwrap();
    assert_eq!(inserted, 0, "re-saving an existing guid must not insert a new row");

    let articles = db.get_recent_articles(feed_id, 10).await.unwrap();
    assert_eq!(articles.len(), 1);
    assert!(articles[0].is_favorite);
}

// The `Store` port has no "set favorite" operation; marking favorites is a
// user-flag mutation outside this crate's scope. Go through `Database::pool`
// directly, as no production code path needs this.
async fn sqlx_mark_favorite(db: &Database, article_id: i64) {
    sqlx::query("UPDATE articles SET is_favorite = 1 WHERE id = ?")
        .bind(article_id)
        .execute(db.pool())
        .await
        .unwrap();
}

// S3: progress reporting reflects queued/running/completed counts and
// exposes per-feed error strings without polling internally.
#[tokio::test]
async fn s3_progress_snapshot_reflects_feed_errors() {
    let db = test_db().await;
    let feed_id = db.add_feed("https://example.com/feed.xml", "Feed").await.unwrap();
    db.update_feed_error(feed_id, Some("connection refused")).await.unwrap();

    let core = Core::with_defaults(
        db.clone(),
        Arc::new(FakeParser { articles: vec![] }),
        CoreConfig::default(),
    );

    let snapshot = core.progress().await.unwrap();
    assert_eq!(snapshot.errors.get(&feed_id).map(|s| s.as_str()), Some("connection refused"));
    assert!(!snapshot.is_running);
}

// S4: clearing a feed's error on the next successful refresh removes it
// from the progress snapshot.
#[tokio::test]
async fn s4_clearing_error_removes_it_from_progress() {
    let db = test_db().await;
    let feed_id = db.add_feed("https://example.com/feed.xml", "Feed").await.unwrap();
    db.update_feed_error(feed_id, Some("timeout")).await.unwrap();
    db.update_feed_error(feed_id, None).await.unwrap();

    let core = Core::with_defaults(
        db.clone(),
        Arc::new(FakeParser { articles: vec![] }),
        CoreConfig::default(),
    );
    let snapshot = core.progress().await.unwrap();
    assert!(!snapshot.errors.contains_key(&feed_id));
}

// S5: manual cleanup clears cached content but never touches a favorited
// article, regardless of the quiescence gate.
#[tokio::test]
async fn s5_manual_cleanup_respects_favorites() {
    let db = test_db().await;
    let feed_id = db.add_feed("https://example.com/feed.xml", "Feed").await.unwrap();
    db.save_articles(feed_id, &[article("a1"), article("a2")]).await.unwrap();

    let articles = db.get_recent_articles(feed_id, 10).await.unwrap();
    sqlx_mark_favorite(&db, articles[0].id).await;

    let core = Core::with_defaults(
        db.clone(),
        Arc::new(FakeParser { articles: vec![] }),
        CoreConfig::default(),
    );
    core.request_manual_cleanup().await;

    let articles = db.get_recent_articles(feed_id, 10).await.unwrap();
    let favorite = articles.iter().find(|a| a.is_favorite).unwrap();
    let other = articles.iter().find(|a| !a.is_favorite).unwrap();
    assert!(favorite.content.is_some(), "favorited article content must survive cleanup");
    assert!(other.content.is_none(), "non-favorited article content should be cleared");
}

// S6: starting and stopping the core does not panic and leaves the task
// manager fully drained.
#[tokio::test]
async fn s6_start_stop_drains_cleanly() {
    let db = test_db().await;
    let core = Core::with_defaults(
        db,
        Arc::new(FakeParser { articles: vec![] }),
        CoreConfig {
            user_agent: "test-agent/1.0".to_string(),
            max_concurrent_refreshes: 2,
            shutdown_grace_period: Duration::from_millis(200),
        },
    );

    core.start().await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    core.stop().await;
}

#[tokio::test]
async fn noop_enricher_returns_article_unchanged() {
    let enricher = NoopEnricher;
    let input = article("a1");
    let output = enricher.enrich(input.clone()).await.unwrap();
    assert_eq!(output.guid, input.guid);
    assert_eq!(output.title, input.title);
}
