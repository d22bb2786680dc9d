//! # Shortcut Story Client
//!
//! [`StoryFetcher`] implementation calling the Shortcut REST API:
//! `GET {base_url}/stories/{id}` with a bearer token.

use crate::webhook::{ParserError, ShortcutSettings, StoryFetcher};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Default Shortcut API endpoint
pub const DEFAULT_SHORTCUT_API_URL: &str = "https://api.app.shortcut.com/api/v3";

/// HTTP client for Shortcut stories
#[derive(Debug, Clone)]
pub struct HttpStoryClient {
    http_client: reqwest::Client,
    base_url: String,
    settings: Arc<ShortcutSettings>,
}

impl HttpStoryClient {
    /// Build a client for `base_url` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ParserError::ShortcutConfiguration`] if the HTTP client cannot
    /// be created.
    pub fn new(
        settings: Arc<ShortcutSettings>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ParserError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("dora-metrics/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ParserError::ShortcutConfiguration {
                variable: "api_base_url".to_string(),
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            settings,
        })
    }
}

#[async_trait]
impl StoryFetcher for HttpStoryClient {
    #[instrument(skip(self))]
    async fn fetch_story(&self, story_id: &str) -> Result<serde_json::Value, ParserError> {
        let url = format!("{}/stories/{}", self.base_url, story_id);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(self.settings.api_token().expose_secret())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ParserError::StoryFetch {
                status: e.status().map(|s| s.as_u16()),
                message: format!("HTTP request failed: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Shortcut API rejected story request");
            return Err(ParserError::StoryFetch {
                status: Some(status.as_u16()),
                message: format!("Shortcut API returned {} for story {}", status, story_id),
            });
        }

        let body = response.bytes().await.map_err(|e| ParserError::StoryFetch {
            status: None,
            message: format!("Failed to read response body: {}", e),
        })?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(ParserError::MissingShortcutFields {
                message: format!("story {} came back empty", story_id),
            });
        }

        debug!(bytes = body.len(), "Fetched Shortcut story");
        serde_json::from_slice(&body).map_err(|e| ParserError::MalformedPayload {
            message: format!("Shortcut story is not JSON: {}", e),
        })
    }
}

#[cfg(test)]
#[path = "story_client_tests.rs"]
mod tests;
