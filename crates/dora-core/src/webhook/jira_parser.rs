//! Jira webhook parser.
//!
//! Jira is wired up for incidents only, so every webhook classifies as an
//! incident. The sub-event comes from `webhookEvent` (deletions) and
//! `issue_event_type_name` (everything else).
//!
//! Jira issues do not know which repository they belong to. The repository is
//! read from the first `customfield_*` whose value is a GitHub or Bitbucket
//! URL, e.g. `https://bitbucket.org/acme/payments/src/main/` → `acme/payments`.

use crate::{
    webhook::{
        handle_opened, handle_resolved, json_path, json_text, EventParser, NormalizedPayload,
        ParserError, PayloadParts, Provider, SubEvent, WebhookInput,
    },
    EventType,
};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// URL prefixes recognised in Jira custom fields
const REPOSITORY_URL_PREFIXES: &[&str] = &["https://github.com/", "https://bitbucket.org/"];

/// Parser for Jira Cloud webhooks
#[derive(Debug, Clone, Default)]
pub struct JiraParser;

impl JiraParser {
    /// The canonical provider ID for this parser.
    pub const PROVIDER_ID: &'static str = "jira";

    pub fn new() -> Self {
        Self
    }

    fn sub_event(body: &serde_json::Value) -> SubEvent {
        let webhook_event = json_text(body, "webhookEvent").unwrap_or_default();
        if webhook_event == "jira:issue_deleted" {
            return SubEvent::Deleted;
        }

        let issue_event = json_text(body, "issue_event_type_name").unwrap_or_default();
        match issue_event.as_str() {
            "issue_created" => SubEvent::Opened,
            "issue_reopened" => SubEvent::Labeled,
            "issue_resolved" | "issue_closed" => SubEvent::Closed,
            "issue_generic" | "issue_updated"
                if json_text(body, "issue.fields.resolutiondate").is_some() =>
            {
                SubEvent::Closed
            }
            _ => SubEvent::Unknown(format!("{}/{}", webhook_event, issue_event)),
        }
    }

    fn issue_parts(body: &serde_json::Value) -> PayloadParts {
        PayloadParts {
            id: json_text(body, "issue.id"),
            time_created: json_text(body, "issue.fields.created"),
            time_resolved: json_text(body, "issue.fields.resolutiondate")
                .or_else(|| json_text(body, "issue.fields.updated")),
            title: json_text(body, "issue.fields.summary"),
            ..PayloadParts::now(body)
        }
    }

    /// Strip the host prefix and any `/src/...` suffix from a repository URL.
    fn repository_from_url(url: &str) -> Option<String> {
        let path = REPOSITORY_URL_PREFIXES
            .iter()
            .find_map(|prefix| url.strip_prefix(prefix))?;
        let path = path.split("/src/").next().unwrap_or(path);
        let path = path.trim_end_matches('/');

        (!path.is_empty()).then(|| path.to_string())
    }
}

#[async_trait]
impl EventParser for JiraParser {
    fn provider(&self) -> Provider {
        Provider::Jira
    }

    async fn classify(&self, _input: &WebhookInput) -> Result<EventType, ParserError> {
        Ok(EventType::Incident)
    }

    #[instrument(skip(self, input), fields(provider = Self::PROVIDER_ID))]
    async fn extract_payload(
        &self,
        input: &WebhookInput,
    ) -> Result<NormalizedPayload, ParserError> {
        let body = &input.body;

        match Self::sub_event(body) {
            SubEvent::Opened | SubEvent::Labeled => {
                handle_opened("Jira issue", Self::issue_parts(body))
            }
            SubEvent::Closed | SubEvent::Unlabeled | SubEvent::Deleted => {
                handle_resolved("Jira issue", Self::issue_parts(body))
            }
            SubEvent::Push | SubEvent::Unknown(_) => {
                debug!("Unhandled Jira sub-event");
                Ok(NormalizedPayload::unknown())
            }
        }
    }

    /// Find the repository referenced by the issue's custom fields.
    ///
    /// # Errors
    ///
    /// Returns [`ParserError::MissingJiraFields`] when `issue.fields` is absent
    /// and [`ParserError::MissingJiraMatchedCustomFieldKey`] when no custom
    /// field holds a GitHub or Bitbucket URL.
    async fn extract_repo_name(&self, body: &serde_json::Value) -> Result<String, ParserError> {
        let fields = json_path(body, "issue.fields")
            .and_then(|f| f.as_object())
            .ok_or(ParserError::MissingJiraFields)?;

        fields
            .iter()
            .filter(|(key, _)| key.starts_with("customfield_"))
            .filter_map(|(_, value)| value.as_str())
            .find_map(Self::repository_from_url)
            .ok_or(ParserError::MissingJiraMatchedCustomFieldKey)
    }
}

#[cfg(test)]
#[path = "jira_parser_tests.rs"]
mod tests;
