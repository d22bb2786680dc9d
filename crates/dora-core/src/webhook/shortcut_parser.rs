//! Shortcut webhook parser.
//!
//! Shortcut webhooks only describe what changed; the story itself is fetched
//! from the Shortcut REST API through a [`StoryFetcher`]. A parser instance
//! serves exactly one request and caches the fetched story, so `classify`,
//! `extract_repo_name` and `extract_payload` share a single network call.
//!
//! Stories labelled with the configured incident label are incidents; every
//! other story update is treated as a change.

use crate::{
    time,
    webhook::{
        handle_change, handle_opened, handle_resolved, is_empty_body, json_path, json_text,
        EventParser, NormalizedPayload, ParserError, PayloadParts, Provider, SubEvent,
        WebhookInput,
    },
    EventType,
};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, instrument};
use zeroize::{Zeroize, ZeroizeOnDrop};

// ============================================================================
// Configuration
// ============================================================================

/// Shortcut API token
///
/// Never printed; the buffer is wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ApiToken {
    inner: String,
}

impl ApiToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            inner: value.into(),
        }
    }

    /// Get the token for an outgoing request
    pub fn expose_secret(&self) -> &str {
        &self.inner
    }

    pub fn is_empty(&self) -> bool {
        self.inner.trim().is_empty()
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiToken")
            .field("length", &self.inner.len())
            .field("value", &"[REDACTED]")
            .finish()
    }
}

/// Validated settings for the Shortcut integration
#[derive(Debug, Clone)]
pub struct ShortcutSettings {
    api_token: ApiToken,
    repo_name: String,
    incident_label_id: u64,
}

impl ShortcutSettings {
    /// Validate the three Shortcut settings.
    ///
    /// # Errors
    ///
    /// Returns [`ParserError::ShortcutConfiguration`] naming the first setting
    /// that is blank, or `incident_label_id` when it is not a number.
    pub fn new(
        api_token: impl Into<String>,
        repo_name: impl Into<String>,
        incident_label_id: &str,
    ) -> Result<Self, ParserError> {
        let api_token = ApiToken::new(api_token);
        if api_token.is_empty() {
            return Err(Self::config_error("api_token", "must not be blank"));
        }

        let repo_name = repo_name.into();
        if repo_name.trim().is_empty() {
            return Err(Self::config_error("repo_name", "must not be blank"));
        }

        let label = incident_label_id.trim();
        if label.is_empty() {
            return Err(Self::config_error("incident_label_id", "must not be blank"));
        }
        let incident_label_id = label.parse::<u64>().map_err(|_| {
            Self::config_error(
                "incident_label_id",
                &format!("'{}' is not a numeric label id", label),
            )
        })?;

        Ok(Self {
            api_token,
            repo_name,
            incident_label_id,
        })
    }

    fn config_error(variable: &str, message: &str) -> ParserError {
        ParserError::ShortcutConfiguration {
            variable: variable.to_string(),
            message: message.to_string(),
        }
    }

    pub fn api_token(&self) -> &ApiToken {
        &self.api_token
    }

    pub fn repo_name(&self) -> &str {
        &self.repo_name
    }

    pub fn incident_label_id(&self) -> u64 {
        self.incident_label_id
    }
}

// ============================================================================
// Story fetching
// ============================================================================

/// Source of full Shortcut stories
#[async_trait]
pub trait StoryFetcher: Send + Sync {
    /// Fetch a story by its numeric id.
    ///
    /// Implementations report HTTP failures as [`ParserError::StoryFetch`].
    async fn fetch_story(&self, story_id: &str) -> Result<serde_json::Value, ParserError>;
}

// ============================================================================
// Parser
// ============================================================================

/// Parser for Shortcut webhooks; one instance per request
pub struct ShortcutParser {
    settings: Arc<ShortcutSettings>,
    fetcher: Arc<dyn StoryFetcher>,
    story: OnceCell<serde_json::Value>,
}

impl fmt::Debug for ShortcutParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShortcutParser")
            .field("settings", &self.settings)
            .field("story_fetched", &self.story.initialized())
            .finish()
    }
}

impl ShortcutParser {
    /// The canonical provider ID for this parser.
    pub const PROVIDER_ID: &'static str = "shortcut";

    pub fn new(settings: Arc<ShortcutSettings>, fetcher: Arc<dyn StoryFetcher>) -> Self {
        Self {
            settings,
            fetcher,
            story: OnceCell::new(),
        }
    }

    fn missing(message: &str) -> ParserError {
        ParserError::MissingShortcutFields {
            message: message.to_string(),
        }
    }

    fn primary_id(body: &serde_json::Value) -> Result<String, ParserError> {
        json_text(body, "primary_id").ok_or_else(|| Self::missing("webhook has no primary_id"))
    }

    /// Fetch the story named by `primary_id`, once per parser.
    async fn story(&self, body: &serde_json::Value) -> Result<&serde_json::Value, ParserError> {
        let story_id = Self::primary_id(body)?;

        self.story
            .get_or_try_init(|| async {
                debug!(story_id = %story_id, "Fetching Shortcut story");
                let story = self.fetcher.fetch_story(&story_id).await?;
                if is_empty_body(&story) {
                    return Err(Self::missing(&format!(
                        "story {} came back empty",
                        story_id
                    )));
                }
                Ok(story)
            })
            .await
    }

    fn story_actions(body: &serde_json::Value) -> impl Iterator<Item = &serde_json::Value> {
        json_path(body, "actions")
            .and_then(|a| a.as_array())
            .into_iter()
            .flatten()
            .filter(|action| json_text(action, "entity_type").as_deref() == Some("story"))
    }

    /// The story action the webhook is about: the one matching `primary_id`,
    /// else the first story action.
    fn primary_action(body: &serde_json::Value) -> Option<&serde_json::Value> {
        let primary_id = json_text(body, "primary_id");
        Self::story_actions(body)
            .find(|action| primary_id.is_some() && json_text(action, "id") == primary_id)
            .or_else(|| Self::story_actions(body).next())
    }

    fn has_label(ids: Option<&serde_json::Value>, label: u64) -> bool {
        ids.and_then(|v| v.as_array())
            .is_some_and(|ids| ids.iter().any(|id| id.as_u64() == Some(label)))
    }

    fn story_has_label(&self, story: &serde_json::Value) -> bool {
        let label = self.settings.incident_label_id;
        let by_id = Self::has_label(json_path(story, "label_ids"), label);
        let by_label = json_path(story, "labels")
            .and_then(|l| l.as_array())
            .is_some_and(|labels| {
                labels
                    .iter()
                    .any(|l| json_path(l, "id").and_then(|id| id.as_u64()) == Some(label))
            });
        by_id || by_label
    }

    fn is_label_added(action: &serde_json::Value, label: u64) -> bool {
        Self::has_label(json_path(action, "changes.label_ids.adds"), label)
    }

    fn is_label_removed(action: &serde_json::Value, label: u64) -> bool {
        Self::has_label(json_path(action, "changes.label_ids.removes"), label)
    }

    fn is_created_with_label(action: &serde_json::Value, label: u64) -> bool {
        json_text(action, "action").as_deref() == Some("create")
            && Self::has_label(json_path(action, "label_ids"), label)
    }

    fn is_completed(action: &serde_json::Value) -> bool {
        json_path(action, "changes.completed.new").and_then(|v| v.as_bool()) == Some(true)
    }

    fn is_delete(body: &serde_json::Value) -> bool {
        Self::primary_action(body)
            .is_some_and(|action| json_text(action, "action").as_deref() == Some("delete"))
    }

    async fn sub_event(&self, body: &serde_json::Value) -> Result<SubEvent, ParserError> {
        let label = self.settings.incident_label_id;
        let Some(action) = Self::primary_action(body) else {
            return Ok(SubEvent::Unknown("no story action".to_string()));
        };

        let sub_event = match json_text(action, "action").as_deref() {
            Some("create") if Self::has_label(json_path(action, "label_ids"), label) => {
                SubEvent::Opened
            }
            Some("create") => SubEvent::Push,
            Some("update") if Self::is_label_added(action, label) => SubEvent::Labeled,
            Some("update") if Self::is_label_removed(action, label) => SubEvent::Unlabeled,
            Some("update") if Self::is_completed(action) => {
                if self.story_has_label(self.story(body).await?) {
                    SubEvent::Closed
                } else {
                    SubEvent::Push
                }
            }
            Some("update") => SubEvent::Push,
            Some(other) => SubEvent::Unknown(other.to_string()),
            None => SubEvent::Unknown(String::new()),
        };

        Ok(sub_event)
    }

    /// `changed_at` as Unix millis, else now
    fn event_time(body: &serde_json::Value) -> String {
        json_text(body, "changed_at")
            .and_then(|changed| time::to_unix_millis(&changed).ok())
            .unwrap_or_else(|| time::now_millis().to_string())
    }

    fn story_parts(body: &serde_json::Value, story: &serde_json::Value) -> PayloadParts {
        PayloadParts {
            id: json_text(story, "id"),
            time_created: json_text(story, "created_at"),
            time_resolved: json_text(story, "completed_at")
                .or_else(|| json_text(body, "changed_at"))
                .or_else(|| json_text(story, "updated_at")),
            title: json_text(story, "name"),
            event_time: Self::event_time(body),
            message: body.to_string(),
        }
    }
}

#[async_trait]
impl EventParser for ShortcutParser {
    fn provider(&self) -> Provider {
        Provider::Shortcut
    }

    /// Incident when the primary story action adds or removes the incident
    /// label, or a labelled story is created or completed; change otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ParserError::MissingShortcutFields`] for an empty webhook body.
    async fn classify(&self, input: &WebhookInput) -> Result<EventType, ParserError> {
        let body = &input.body;
        if is_empty_body(body) {
            return Err(Self::missing("webhook body is empty"));
        }

        // Must read the same action that `sub_event` dispatches on
        let Some(action) = Self::primary_action(body) else {
            return Ok(EventType::Change);
        };

        let label = self.settings.incident_label_id;
        if Self::is_label_added(action, label)
            || Self::is_label_removed(action, label)
            || Self::is_created_with_label(action, label)
        {
            return Ok(EventType::Incident);
        }

        if Self::is_completed(action) && self.story_has_label(self.story(body).await?) {
            return Ok(EventType::Incident);
        }

        Ok(EventType::Change)
    }

    #[instrument(skip(self, input), fields(provider = Self::PROVIDER_ID))]
    async fn extract_payload(
        &self,
        input: &WebhookInput,
    ) -> Result<NormalizedPayload, ParserError> {
        let body = &input.body;
        if is_empty_body(body) {
            return Err(Self::missing("webhook body is empty"));
        }

        let sub_event = self.sub_event(body).await?;
        if let SubEvent::Unknown(name) = &sub_event {
            debug!(sub_event = %name, "Unhandled Shortcut sub-event");
            return Ok(NormalizedPayload::unknown());
        }

        let parts = Self::story_parts(body, self.story(body).await?);
        match sub_event {
            SubEvent::Push => handle_change("Shortcut story", parts),
            SubEvent::Opened | SubEvent::Labeled => handle_opened("Shortcut story", parts),
            SubEvent::Closed | SubEvent::Unlabeled | SubEvent::Deleted => {
                handle_resolved("Shortcut story", parts)
            }
            SubEvent::Unknown(_) => Ok(NormalizedPayload::unknown()),
        }
    }

    /// Returns the configured repository name once the story has been fetched.
    ///
    /// Deletions skip the fetch since the story is already gone.
    ///
    /// # Errors
    ///
    /// Returns [`ParserError::MissingShortcutFields`] when `primary_id` is
    /// missing or the story comes back empty, and [`ParserError::StoryFetch`]
    /// when the API call fails.
    async fn extract_repo_name(&self, body: &serde_json::Value) -> Result<String, ParserError> {
        if !Self::is_delete(body) {
            self.story(body).await?;
        }
        Ok(self.settings.repo_name.clone())
    }
}

#[cfg(test)]
#[path = "shortcut_parser_tests.rs"]
mod tests;
