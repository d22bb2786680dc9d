//! GitHub webhook parser.
//!
//! Handles the `push` and `issues` events, keyed by the `X-GitHub-Event`
//! header:
//!
//! - `push` becomes a change, identified by `head_commit.id`
//! - `issues` becomes an incident; `body.action` selects the sub-event
//!
//! Issues only count as incidents when they carry an `incident` or `bug`
//! label. An opened/labeled issue without one produces
//! [`NormalizedPayload::filtered`].

use crate::{
    webhook::{
        handle_change, handle_opened, handle_resolved, json_path, json_text, EventParser,
        NormalizedPayload, ParserError, PayloadParts, Provider, SubEvent, WebhookHeaders,
        WebhookInput,
    },
    EventType,
};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Labels that mark a GitHub issue as an incident
const INCIDENT_LABELS: &[&str] = &["incident", "bug"];

/// Parser for GitHub webhooks
#[derive(Debug, Clone, Default)]
pub struct GithubParser;

impl GithubParser {
    /// The canonical provider ID for this parser.
    pub const PROVIDER_ID: &'static str = "github";

    pub fn new() -> Self {
        Self
    }

    fn event_name(headers: &WebhookHeaders) -> &str {
        headers.get("x-github-event").unwrap_or_default()
    }

    fn sub_event(input: &WebhookInput) -> SubEvent {
        match Self::event_name(&input.headers) {
            "push" => SubEvent::Push,
            "issues" => {
                let action = input
                    .body
                    .get("action")
                    .and_then(|a| a.as_str())
                    .unwrap_or_default();
                SubEvent::from_action(action)
            }
            other => SubEvent::Unknown(other.to_string()),
        }
    }

    fn has_incident_label(body: &serde_json::Value) -> bool {
        json_path(body, "issue.labels")
            .and_then(|labels| labels.as_array())
            .map(|labels| {
                labels.iter().any(|label| {
                    label
                        .get("name")
                        .and_then(|n| n.as_str())
                        .is_some_and(|name| INCIDENT_LABELS.contains(&name))
                })
            })
            .unwrap_or(false)
    }

    fn issue_parts(body: &serde_json::Value) -> PayloadParts {
        PayloadParts {
            id: json_text(body, "issue.id"),
            time_created: json_text(body, "issue.created_at"),
            time_resolved: json_text(body, "issue.closed_at")
                .or_else(|| json_text(body, "issue.updated_at")),
            title: json_text(body, "issue.title"),
            ..PayloadParts::now(body)
        }
    }
}

#[async_trait]
impl EventParser for GithubParser {
    fn provider(&self) -> Provider {
        Provider::Github
    }

    /// `push` maps to change, `issues` to incident.
    ///
    /// # Errors
    ///
    /// Returns [`ParserError::UnknownEventType`] for any other GitHub event.
    async fn classify(&self, input: &WebhookInput) -> Result<EventType, ParserError> {
        match Self::event_name(&input.headers) {
            "push" => Ok(EventType::Change),
            "issues" => Ok(EventType::Incident),
            other => Err(ParserError::UnknownEventType {
                event_type: other.to_string(),
            }),
        }
    }

    #[instrument(skip(self, input), fields(provider = Self::PROVIDER_ID))]
    async fn extract_payload(
        &self,
        input: &WebhookInput,
    ) -> Result<NormalizedPayload, ParserError> {
        let body = &input.body;

        match Self::sub_event(input) {
            SubEvent::Push => {
                let parts = PayloadParts {
                    id: json_text(body, "head_commit.id"),
                    time_created: json_text(body, "head_commit.timestamp"),
                    ..PayloadParts::now(body)
                };
                handle_change("GitHub push", parts)
            }
            SubEvent::Opened | SubEvent::Labeled => {
                if !Self::has_incident_label(body) {
                    debug!("Issue has no incident label; ignoring");
                    return Ok(NormalizedPayload::filtered());
                }
                handle_opened("GitHub issue", Self::issue_parts(body))
            }
            SubEvent::Closed | SubEvent::Unlabeled | SubEvent::Deleted => {
                handle_resolved("GitHub issue", Self::issue_parts(body))
            }
            SubEvent::Unknown(name) => {
                debug!(sub_event = %name, "Unhandled GitHub sub-event");
                Ok(NormalizedPayload::unknown())
            }
        }
    }

    async fn extract_repo_name(&self, body: &serde_json::Value) -> Result<String, ParserError> {
        Ok(json_text(body, "repository.full_name").unwrap_or_default())
    }
}

#[cfg(test)]
#[path = "github_parser_tests.rs"]
mod tests;
