//! Integration tests for the loader lifecycle: primary pages, the switch to
//! the secondary source, exhaustion, re-entrancy and failure recovery.
//!
//! Each test runs its own mock API server and in-memory store.

use anyhow::{anyhow, Result};
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use newsroll::feed::{Source, SourceSettings};
use newsroll::loader::{FeedLoader, LoaderConfig, LoaderPhase, TriggerOutcome};
use newsroll::render::HtmlContainer;
use newsroll::storage::{KeyValueStore, MemoryStore};

const PRIMARY_PATH: &str = "/svc/topstories/v2/science.json";
const SECONDARY_PATH: &str = "/svc/news/v3/content/all/all.json";

fn story(n: usize) -> Value {
    json!({
        "section": "science",
        "title": format!("Story {n}"),
        "abstract": format!("Abstract {n}"),
        "url": format!("https://www.example.com/story/{n}"),
        "multimedia": [
            { "url": format!("https://img.example.com/{n}-thumb.jpg"), "format": "Standard Thumbnail" },
            { "url": format!("https://img.example.com/{n}-medium.jpg"), "format": "mediumThreeByTwo210" }
        ]
    })
}

fn body(stories: impl IntoIterator<Item = usize>) -> Value {
    json!({ "status": "OK", "results": stories.into_iter().map(story).collect::<Vec<_>>() })
}

fn config(server: &MockServer, api_key: Option<&str>) -> LoaderConfig {
    let source = |path: &str, section: &str, key: &str| SourceSettings {
        endpoint: Url::parse(&format!("{}{}", server.uri(), path)).unwrap(),
        image_base_url: Some(Url::parse("https://static.example.com/").unwrap()),
        default_section: section.to_string(),
        cache_key: key.to_string(),
    };
    LoaderConfig {
        page_size: 5,
        cache_ttl: Duration::from_secs(3600),
        placeholder_image: "assets/images/01.jpg".to_string(),
        api_key: api_key.map(SecretString::from),
        primary: source(PRIMARY_PATH, "science", "cache.primary"),
        secondary: source(SECONDARY_PATH, "news", "cache.secondary"),
    }
}

fn loader<S: KeyValueStore>(server: &MockServer, store: S) -> FeedLoader<S, HtmlContainer> {
    FeedLoader::new(
        reqwest::Client::new(),
        config(server, None),
        store,
        HtmlContainer::new(),
    )
}

async fn mount_primary(server: &MockServer, response: Value, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path(PRIMARY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(response))
        .expect(expected_calls)
        .mount(server)
        .await;
}

async fn mount_secondary(server: &MockServer, offset: usize, response: Value, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path(SECONDARY_PATH))
        .and(query_param("offset", offset.to_string()))
        .and(query_param("limit", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(response))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn rendered(outcome: TriggerOutcome) -> (Source, usize) {
    match outcome {
        TriggerOutcome::Rendered { source, count } => (source, count),
        other => panic!("Expected Rendered, got {:?}", other),
    }
}

/// Store whose every operation fails, like a browser with storage disabled.
struct FailingStore;

impl KeyValueStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(anyhow!("storage unavailable"))
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<()> {
        Err(anyhow!("quota exceeded"))
    }

    async fn remove(&self, _key: &str) -> Result<()> {
        Err(anyhow!("storage unavailable"))
    }
}

// ============================================================================
// Pagination
// ============================================================================

#[tokio::test]
async fn test_twelve_primary_items_then_secondary() {
    let server = MockServer::start().await;
    mount_primary(&server, body(1..=12), 1).await;
    mount_secondary(&server, 0, body(13..=17), 1).await;

    let loader = loader(&server, MemoryStore::new());

    assert_eq!(rendered(loader.on_trigger().await), (Source::Primary, 5));
    assert_eq!(rendered(loader.on_trigger().await), (Source::Primary, 5));
    assert_eq!(rendered(loader.on_trigger().await), (Source::Primary, 2));
    assert_eq!(rendered(loader.on_trigger().await), (Source::Secondary, 5));

    let fragments = loader.sink().fragments();
    assert_eq!(fragments.len(), 17);
    assert!(fragments[0].contains("https://www.example.com/story/1"));
    assert!(fragments[0].contains("1-medium.jpg"));
    assert!(fragments[16].contains("https://www.example.com/story/17"));
    assert_eq!(loader.rendered_count(), 17);
}

#[tokio::test]
async fn test_secondary_offset_advances_until_short_page() {
    let server = MockServer::start().await;
    mount_primary(&server, body([]), 1).await;
    mount_secondary(&server, 0, body(1..=5), 1).await;
    mount_secondary(&server, 5, body(6..=8), 1).await;

    let loader = loader(&server, MemoryStore::new());

    assert_eq!(rendered(loader.on_trigger().await), (Source::Secondary, 5));
    assert_eq!(rendered(loader.on_trigger().await), (Source::Secondary, 3));
    assert!(loader.is_exhausted());
    assert_eq!(loader.on_trigger().await, TriggerOutcome::Exhausted);
}

#[tokio::test]
async fn test_primary_without_valid_items_continues_to_secondary() {
    let server = MockServer::start().await;
    let no_links = json!({ "results": [{ "title": "No link" }, { "url": "/relative.html" }] });
    mount_primary(&server, no_links, 1).await;
    mount_secondary(&server, 0, body(1..=5), 1).await;

    let loader = loader(&server, MemoryStore::new());

    // The start-up trigger must fill the page even though the primary had nothing.
    assert_eq!(rendered(loader.on_trigger().await), (Source::Secondary, 5));
    assert_eq!(loader.sink().len(), 5);
    assert_eq!(loader.phase(), LoaderPhase::Idle);
}

#[tokio::test]
async fn test_primary_ending_with_items_does_not_touch_secondary() {
    let server = MockServer::start().await;
    mount_primary(&server, body(1..=5), 1).await;
    Mock::given(method("GET"))
        .and(path(SECONDARY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(body(6..=10)))
        .expect(0)
        .mount(&server)
        .await;

    let loader = loader(&server, MemoryStore::new());
    assert_eq!(rendered(loader.on_trigger().await), (Source::Primary, 5));
}

#[tokio::test]
async fn test_duplicates_across_sources_render_once() {
    let server = MockServer::start().await;
    mount_primary(&server, body([1, 2, 3]), 1).await;
    mount_secondary(&server, 0, body([2, 4]), 1).await;

    let loader = loader(&server, MemoryStore::new());

    assert_eq!(rendered(loader.on_trigger().await), (Source::Primary, 3));
    assert_eq!(rendered(loader.on_trigger().await), (Source::Secondary, 1));

    let fragments = loader.sink().fragments();
    let story_two = fragments
        .iter()
        .filter(|f| f.contains("https://www.example.com/story/2\""))
        .count();
    assert_eq!(story_two, 1);
    assert!(fragments[3].contains("https://www.example.com/story/4"));
}

#[tokio::test]
async fn test_exhausted_loader_makes_no_requests() {
    let server = MockServer::start().await;
    mount_primary(&server, body([1]), 1).await;
    mount_secondary(&server, 0, body([]), 1).await;

    let loader = loader(&server, MemoryStore::new());
    loader.on_trigger().await;
    loader.on_trigger().await;
    assert_eq!(loader.phase(), LoaderPhase::Exhausted);

    for _ in 0..3 {
        assert_eq!(loader.on_trigger().await, TriggerOutcome::Exhausted);
    }
    assert_eq!(loader.sink().len(), 1);
}

#[tokio::test]
async fn test_records_without_url_are_skipped() {
    let server = MockServer::start().await;
    let response = json!({ "results": [
        { "title": "No link" },
        { "title": "Relative", "url": "/2024/01/01/relative.html" },
        story(1),
        "not an object"
    ]});
    mount_primary(&server, response, 1).await;

    let loader = loader(&server, MemoryStore::new());
    assert_eq!(rendered(loader.on_trigger().await), (Source::Primary, 1));
}

// ============================================================================
// Re-entrancy
// ============================================================================

#[tokio::test]
async fn test_concurrent_triggers_fetch_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PRIMARY_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(body(1..=12))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let loader = loader(&server, MemoryStore::new());
    let (first, second) = tokio::join!(loader.on_trigger(), loader.on_trigger());

    assert_eq!(
        first,
        TriggerOutcome::Rendered {
            source: Source::Primary,
            count: 5
        }
    );
    assert_eq!(second, TriggerOutcome::Busy(Source::Primary));
    assert_eq!(loader.sink().len(), 5);
    assert_eq!(loader.phase(), LoaderPhase::Idle);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_http_error_renders_alert_and_next_trigger_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PRIMARY_PATH))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_primary(&server, body(1..=3), 1).await;

    let loader = loader(&server, MemoryStore::new());

    assert_eq!(loader.on_trigger().await, TriggerOutcome::Failed(Source::Primary));
    let fragments = loader.sink().fragments();
    assert_eq!(fragments.len(), 1);
    assert!(fragments[0].contains("alert"));
    assert_eq!(loader.rendered_count(), 0);

    assert_eq!(rendered(loader.on_trigger().await), (Source::Primary, 3));
}

#[tokio::test]
async fn test_malformed_payload_is_not_cached() {
    let server = MockServer::start().await;
    mount_primary(&server, json!({ "status": "ERROR", "errors": ["bad key"] }), 1).await;

    let store = MemoryStore::new();
    let loader = loader(&server, store.clone());

    assert_eq!(loader.on_trigger().await, TriggerOutcome::Failed(Source::Primary));
    assert!(store.is_empty());
    assert!(!loader.is_exhausted());
}

#[tokio::test]
async fn test_secondary_failure_keeps_offset() {
    let server = MockServer::start().await;
    mount_primary(&server, body([]), 1).await;
    Mock::given(method("GET"))
        .and(path(SECONDARY_PATH))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_secondary(&server, 0, body(1..=2), 1).await;

    let loader = loader(&server, MemoryStore::new());

    assert_eq!(loader.on_trigger().await, TriggerOutcome::Failed(Source::Secondary));
    assert_eq!(rendered(loader.on_trigger().await), (Source::Secondary, 2));
}

#[tokio::test]
async fn test_api_key_sent_but_never_rendered() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PRIMARY_PATH))
        .and(query_param("api-key", "sekrit-key"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let loader = FeedLoader::new(
        reqwest::Client::new(),
        config(&server, Some("sekrit-key")),
        MemoryStore::new(),
        HtmlContainer::new(),
    );

    assert_eq!(loader.on_trigger().await, TriggerOutcome::Failed(Source::Primary));
    assert!(!loader.sink().to_document("News").contains("sekrit-key"));
}

#[tokio::test]
async fn test_failing_store_falls_back_to_network() {
    let server = MockServer::start().await;
    mount_primary(&server, body(1..=7), 1).await;

    let loader = loader(&server, FailingStore);

    assert_eq!(rendered(loader.on_trigger().await), (Source::Primary, 5));
    assert_eq!(rendered(loader.on_trigger().await), (Source::Primary, 2));
}
