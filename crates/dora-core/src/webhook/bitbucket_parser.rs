//! Bitbucket webhook parser.
//!
//! Keyed by the `X-Event-Key` header: `repo:push` becomes a change,
//! `issue:created` and `issue:updated` become incidents. Updated issues are
//! treated as resolved when their state is terminal and as re-opened when it
//! is `new` or `open`.

use crate::{
    webhook::{
        handle_change, handle_opened, handle_resolved, json_text, EventParser, NormalizedPayload,
        ParserError, PayloadParts, Provider, SubEvent, WebhookHeaders, WebhookInput,
    },
    EventType,
};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Issue states that mean the incident is over
const RESOLVED_STATES: &[&str] = &["resolved", "closed", "invalid", "duplicate", "wontfix"];

/// Issue states that mean the incident is (again) open
const OPEN_STATES: &[&str] = &["new", "open"];

/// Parser for Bitbucket Cloud webhooks
#[derive(Debug, Clone, Default)]
pub struct BitbucketParser;

impl BitbucketParser {
    /// The canonical provider ID for this parser.
    pub const PROVIDER_ID: &'static str = "bitbucket";

    pub fn new() -> Self {
        Self
    }

    fn event_key(headers: &WebhookHeaders) -> &str {
        headers.get("x-event-key").unwrap_or_default()
    }

    fn sub_event(input: &WebhookInput) -> SubEvent {
        match Self::event_key(&input.headers) {
            "repo:push" => SubEvent::Push,
            "issue:created" => SubEvent::Opened,
            "issue:updated" => {
                let state = json_text(&input.body, "issue.state").unwrap_or_default();
                if RESOLVED_STATES.contains(&state.as_str()) {
                    SubEvent::Closed
                } else if OPEN_STATES.contains(&state.as_str()) {
                    SubEvent::Labeled
                } else {
                    SubEvent::Unknown(format!("issue:updated ({})", state))
                }
            }
            other => SubEvent::Unknown(other.to_string()),
        }
    }

    fn issue_parts(body: &serde_json::Value) -> PayloadParts {
        PayloadParts {
            id: json_text(body, "issue.id"),
            time_created: json_text(body, "issue.created_on"),
            time_resolved: json_text(body, "issue.updated_on"),
            title: json_text(body, "issue.title"),
            ..PayloadParts::now(body)
        }
    }
}

#[async_trait]
impl EventParser for BitbucketParser {
    fn provider(&self) -> Provider {
        Provider::Bitbucket
    }

    /// `repo:push` maps to change, `issue:created`/`issue:updated` to incident.
    ///
    /// # Errors
    ///
    /// Returns [`ParserError::UnknownEventType`] for any other event key.
    async fn classify(&self, input: &WebhookInput) -> Result<EventType, ParserError> {
        match Self::event_key(&input.headers) {
            "repo:push" => Ok(EventType::Change),
            "issue:created" | "issue:updated" => Ok(EventType::Incident),
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
                    id: json_text(body, "push.changes.0.new.target.hash"),
                    time_created: json_text(body, "push.changes.0.new.target.date"),
                    ..PayloadParts::now(body)
                };
                handle_change("Bitbucket push", parts)
            }
            SubEvent::Opened | SubEvent::Labeled => {
                handle_opened("Bitbucket issue", Self::issue_parts(body))
            }
            SubEvent::Closed | SubEvent::Unlabeled | SubEvent::Deleted => {
                handle_resolved("Bitbucket issue", Self::issue_parts(body))
            }
            SubEvent::Unknown(name) => {
                debug!(sub_event = %name, "Unhandled Bitbucket sub-event");
                Ok(NormalizedPayload::unknown())
            }
        }
    }

    async fn extract_repo_name(&self, body: &serde_json::Value) -> Result<String, ParserError> {
        Ok(json_text(body, "repository.full_name").unwrap_or_default())
    }
}

#[cfg(test)]
#[path = "bitbucket_parser_tests.rs"]
mod tests;
