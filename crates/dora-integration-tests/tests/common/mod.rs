//! Common test utilities for dora-api integration tests
//!
//! This module provides:
//! - A router wired to an in-memory repository and a canned story fetcher
//! - Request builders for each webhook provider
//! - Timestamp helpers relative to the current time

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use dora_api::{create_router, AppState, ServiceConfig};
use dora_core::{
    webhook::{ParserSelector, ShortcutSettings, StoryFetcher},
    InMemoryRepository, ParserError,
};
use http_body_util::BodyExt;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tower::ServiceExt;

pub const SHORTCUT_INCIDENT_LABEL: u64 = 4242;
pub const SHORTCUT_REPO: &str = "acme/platform";

const MILLIS_PER_HOUR: i64 = 3_600_000;

// ============================================================================
// Story fetcher
// ============================================================================

/// Story fetcher returning one canned story and counting requests
#[allow(dead_code)]
pub struct CannedStoryFetcher {
    story: serde_json::Value,
    calls: AtomicUsize,
}

impl CannedStoryFetcher {
    pub fn new(story: serde_json::Value) -> Self {
        Self {
            story,
            calls: AtomicUsize::new(0),
        }
    }

    #[allow(dead_code)]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoryFetcher for CannedStoryFetcher {
    async fn fetch_story(&self, _story_id: &str) -> Result<serde_json::Value, ParserError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.story.clone())
    }
}

// ============================================================================
// Test application
// ============================================================================

/// Router plus handles on its collaborators
#[allow(dead_code)]
pub struct TestApp {
    pub router: Router,
    pub repository: InMemoryRepository,
    pub fetcher: Arc<CannedStoryFetcher>,
}

impl TestApp {
    /// Send a request and decode the JSON response body
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }
}

/// App with metrics caching and a Shortcut integration serving `story`
pub fn test_app_with_story(story: serde_json::Value) -> TestApp {
    let repository = InMemoryRepository::with_metrics_cache();
    let fetcher = Arc::new(CannedStoryFetcher::new(story));
    let settings = ShortcutSettings::new(
        "test-token",
        SHORTCUT_REPO,
        &SHORTCUT_INCIDENT_LABEL.to_string(),
    )
    .unwrap();

    let selector = ParserSelector::new().with_shortcut(Arc::new(settings), fetcher.clone());
    let state = AppState::new(
        ServiceConfig::default(),
        Arc::new(repository.clone()),
        selector,
    );

    TestApp {
        router: create_router(state),
        repository,
        fetcher,
    }
}

#[allow(dead_code)]
pub fn test_app() -> TestApp {
    test_app_with_story(serde_json::json!({}))
}

// ============================================================================
// Request builders
// ============================================================================

fn webhook(user_agent: &str, headers: &[(&str, &str)], body: &serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/event")
        .header("content-type", "application/json")
        .header("user-agent", user_agent);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[allow(dead_code)]
pub fn github_webhook(event: &str, body: &serde_json::Value) -> Request<Body> {
    webhook("GitHub-Hookshot/7f2a1b9", &[("X-GitHub-Event", event)], body)
}

#[allow(dead_code)]
pub fn bitbucket_webhook(event_key: &str, body: &serde_json::Value) -> Request<Body> {
    webhook("Bitbucket-Webhooks/2.0", &[("X-Event-Key", event_key)], body)
}

#[allow(dead_code)]
pub fn jira_webhook(body: &serde_json::Value) -> Request<Body> {
    webhook("Atlassian Webhook HTTP Client", &[], body)
}

#[allow(dead_code)]
pub fn shortcut_webhook(body: &serde_json::Value) -> Request<Body> {
    webhook(
        "Apache-HttpClient/4.5.13 (Java/11.0.13)",
        &[("Shortcut-Signature", "5b1e0c2f")],
        body,
    )
}

#[allow(dead_code)]
pub fn direct_event(body: &serde_json::Value) -> Request<Body> {
    webhook("curl/8.4.0", &[], body)
}

#[allow(dead_code)]
pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

// ============================================================================
// Time helpers
// ============================================================================

/// Unix-ms timestamp `days` days before now, moved forward by `hours` hours
#[allow(dead_code)]
pub fn days_ago(days: i64, hours: i64) -> i64 {
    chrono::Utc::now().timestamp_millis() - days * 24 * MILLIS_PER_HOUR + hours * MILLIS_PER_HOUR
}
