//! Integration tests for the HTTP text source.
//!
//! A small axum server stands in for the text API so that status codes,
//! query strings, and response shapes go through a real HTTP round trip.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chapter_window::chapter_window_core::cache::{ChapterWindowCache, EnsureOutcome};
use chapter_window::chapter_window_core::models::ChapterState;
use chapter_window::chapter_window_core::source::TextSource;
use chapter_window::config::SourceConfig;
use chapter_window::http_source::HttpTextSource;
use serde_json::{json, Value};

// ─── Fixture server ─────────────────────────────────────────────────

#[derive(Clone, Default)]
struct Fixture {
    /// Reference (`"Genesis.4"`) → canned response.
    routes: Arc<Mutex<HashMap<String, (StatusCode, Value)>>>,
    /// Every request seen, as (reference, raw query).
    seen: Arc<Mutex<Vec<(String, String)>>>,
}

impl Fixture {
    fn route(&self, reference: &str, status: StatusCode, body: Value) {
        self.routes
            .lock()
            .unwrap()
            .insert(reference.to_string(), (status, body));
    }

    fn seen(&self) -> Vec<(String, String)> {
        self.seen.lock().unwrap().clone()
    }
}

async fn texts(
    State(fixture): State<Fixture>,
    Path(reference): Path<String>,
    RawQuery(query): RawQuery,
) -> Response {
    fixture
        .seen
        .lock()
        .unwrap()
        .push((reference.clone(), query.unwrap_or_default()));

    let canned = fixture.routes.lock().unwrap().get(&reference).cloned();
    match canned {
        Some((status, body)) => (status, Json(body)).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({ "error": "unknown ref" }))).into_response(),
    }
}

async fn start_fixture() -> (Fixture, String) {
    let fixture = Fixture::default();
    let app = Router::new()
        .route("/api/texts/{reference}", get(texts))
        .route("/broken/texts/{reference}", get(|| async { "<html>not json</html>" }))
        .with_state(fixture.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (fixture, format!("http://{}", addr))
}

fn source_config(base_url: String) -> SourceConfig {
    SourceConfig {
        base_url,
        timeout_secs: 5,
        ..SourceConfig::default()
    }
}

fn chapter_body(he: &[&str], en: &[&str]) -> Value {
    json!({
        "ref": "Genesis 4",
        "versions": [
            { "language": "he", "versionTitle": "Tanakh", "text": he },
            { "language": "en", "versionTitle": "JPS", "text": en }
        ]
    })
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_fetch_pairs_versions_by_language() {
    let (fixture, base) = start_fixture().await;
    fixture.route(
        "Genesis.4",
        StatusCode::OK,
        chapter_body(&["וְהָאָדָם", "וַתֹּסֶף", "וַיְהִי"], &["Now the man", "She then bore"]),
    );

    let source = HttpTextSource::new(&source_config(format!("{}/api", base))).unwrap();
    let text = source.fetch_chapter("Genesis", 4).await.unwrap();
    assert_eq!(text.primary.segments().len(), 3);
    assert_eq!(text.secondary.segments()[1], "She then bore");

    let seen = fixture.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, "Genesis.4");
    assert_eq!(
        seen[0].1,
        "version=source&version=translation&fill_in_missing_segments=1"
    );
}

#[tokio::test]
async fn test_cache_over_http_drops_unpaired_verses() {
    let (fixture, base) = start_fixture().await;
    fixture.route(
        "Genesis.4",
        StatusCode::OK,
        chapter_body(&["a", "b", "c", "d", "e"], &["A", "B", "C"]),
    );

    let source = Arc::new(HttpTextSource::new(&source_config(format!("{}/api", base))).unwrap());
    let cache = ChapterWindowCache::new("Genesis", source);
    assert_eq!(cache.ensure_chapter(4).await, EnsureOutcome::Loaded { verses: 3 });

    let entry = cache.entry(4).unwrap();
    assert_eq!(entry.state(), ChapterState::Ready);
    assert_eq!(entry.verses[2].primary_text, "c");
    assert_eq!(entry.verses[2].secondary_text, "C");
}

#[tokio::test]
async fn test_non_2xx_is_recorded_as_error() {
    let (fixture, base) = start_fixture().await;
    fixture.route(
        "Genesis.4",
        StatusCode::SERVICE_UNAVAILABLE,
        json!({ "error": "maintenance" }),
    );

    let source = Arc::new(HttpTextSource::new(&source_config(format!("{}/api", base))).unwrap());
    let cache = ChapterWindowCache::new("Genesis", source);
    let outcome = cache.ensure_chapter(4).await;

    let entry = cache.entry(4).unwrap();
    assert_eq!(entry.state(), ChapterState::Errored);
    assert!(!entry.loading);
    assert!(entry.verses.is_empty());
    let message = entry.error.unwrap();
    assert!(message.starts_with("HTTP 503"), "unexpected message: {}", message);
    assert_eq!(outcome, EnsureOutcome::Failed { message });
}

#[tokio::test]
async fn test_missing_versions_degrades_to_empty() {
    let (fixture, base) = start_fixture().await;
    fixture.route("Genesis.4", StatusCode::OK, json!({ "ref": "Genesis 4" }));

    let source = Arc::new(HttpTextSource::new(&source_config(format!("{}/api", base))).unwrap());
    let cache = ChapterWindowCache::new("Genesis", source);
    assert_eq!(cache.ensure_chapter(4).await, EnsureOutcome::Loaded { verses: 0 });
    assert_eq!(cache.entry(4).unwrap().state(), ChapterState::ReadyEmpty);

    // Empty is retry-eligible: the next call goes back to the server.
    fixture.route(
        "Genesis.4",
        StatusCode::OK,
        chapter_body(&["a"], &["A"]),
    );
    assert_eq!(cache.ensure_chapter(4).await, EnsureOutcome::Loaded { verses: 1 });
    assert_eq!(fixture.seen().len(), 2);
}

#[tokio::test]
async fn test_non_json_body_is_an_error() {
    let (_fixture, base) = start_fixture().await;
    let source = HttpTextSource::new(&source_config(format!("{}/broken", base))).unwrap();
    let err = source.fetch_chapter("Genesis", 1).await.unwrap_err();
    assert!(err.message.contains("unexpected response format"), "{}", err);
}

#[tokio::test]
async fn test_connection_refused_is_friendly() {
    // Bind and drop to get a port nothing listens on.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let source = HttpTextSource::new(&source_config(format!("http://127.0.0.1:{}", port))).unwrap();
    let err = source.fetch_chapter("Genesis", 1).await.unwrap_err();
    assert!(err.message.starts_with("Connection error"), "{}", err);
}
