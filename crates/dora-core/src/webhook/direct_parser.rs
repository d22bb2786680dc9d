//! Parser for events posted straight to the service.
//!
//! Direct callers (deployment pipelines, scripts) send a flat body:
//!
//! ```json
//! { "eventType": "deployment", "repo": "acme/checkout", "id": "d-1", "timeCreated": "2024-01-01T00:00:00Z" }
//! ```
//!
//! Everything except `eventType` is optional: the id defaults to a fresh UUID
//! and the creation time to now.

use crate::{
    time,
    webhook::{json_text, EventParser, NormalizedPayload, ParserError, Provider, WebhookInput},
    EventType,
};
use async_trait::async_trait;
use tracing::instrument;

/// Parser for direct API calls
#[derive(Debug, Clone, Default)]
pub struct DirectParser;

impl DirectParser {
    /// The canonical provider ID for this parser.
    pub const PROVIDER_ID: &'static str = "direct";

    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EventParser for DirectParser {
    fn provider(&self) -> Provider {
        Provider::Direct
    }

    /// # Errors
    ///
    /// Returns [`ParserError::UnknownEventType`] unless `eventType` is one of
    /// `change`, `deployment` or `incident`.
    async fn classify(&self, input: &WebhookInput) -> Result<EventType, ParserError> {
        let event_type = json_text(&input.body, "eventType").unwrap_or_default();
        event_type
            .parse::<EventType>()
            .map_err(|_| ParserError::UnknownEventType { event_type })
    }

    #[instrument(skip(self, input), fields(provider = Self::PROVIDER_ID))]
    async fn extract_payload(
        &self,
        input: &WebhookInput,
    ) -> Result<NormalizedPayload, ParserError> {
        let body = &input.body;
        let now = time::now_millis().to_string();

        let time_created = match json_text(body, "timeCreated") {
            Some(created) => time::to_unix_millis(&created)?,
            None => now.clone(),
        };
        let time_resolved = match json_text(body, "timeResolved") {
            Some(resolved) => time::to_unix_millis(&resolved)?,
            None => String::new(),
        };

        Ok(NormalizedPayload {
            id: json_text(body, "id").unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            event_time: now,
            time_created,
            time_resolved: Some(time_resolved),
            title: Some(json_text(body, "title").unwrap_or_default()),
            message: body.to_string(),
        })
    }

    async fn extract_repo_name(&self, body: &serde_json::Value) -> Result<String, ParserError> {
        Ok(json_text(body, "repo")
            .or_else(|| json_text(body, "product"))
            .unwrap_or_default())
    }
}

#[cfg(test)]
#[path = "direct_parser_tests.rs"]
mod tests;
