//! # Webhook Processing Module
//!
//! Turns provider webhooks into canonical events.
//!
//! Each supported provider has an [`EventParser`] implementation. The
//! [`ParserSelector`] picks one from the request headers, and
//! [`assembler::assemble`] drives it to build a
//! [`CanonicalEvent`](crate::CanonicalEvent).
//!
//! | Provider  | Selected when                                               |
//! |-----------|-------------------------------------------------------------|
//! | GitHub    | `User-Agent` contains `GitHub`                              |
//! | Bitbucket | `User-Agent` contains `Bitbucket`                           |
//! | Jira      | `User-Agent` contains `Atlassian`                           |
//! | Shortcut  | `User-Agent` contains `Apache-HttpClient` and a `Shortcut-Signature` header is present |
//! | Direct    | anything else, including no headers at all                  |
//!
//! Parsers resolve a provider-specific sub-event (push, opened, closed...) and
//! hand the extracted fields to one of three shared handlers: change, opened
//! and resolved. Unrecognised sub-events yield [`NormalizedPayload::unknown`];
//! GitHub issues without an incident label yield [`NormalizedPayload::filtered`].

use crate::{time, EventType, ValidationError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// Core Types
// ============================================================================

/// Case-insensitive view over HTTP request headers
///
/// Header names are lower-cased on insertion, so `X-GitHub-Event` and
/// `x-github-event` resolve to the same entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookHeaders {
    inner: HashMap<String, String>,
}

impl WebhookHeaders {
    /// Create an empty header set
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a raw header map with arbitrary key casing
    pub fn from_http_headers(headers: &HashMap<String, String>) -> Self {
        headers
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect()
    }

    /// Insert a header, replacing any existing value for the same name
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.inner
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
    }

    /// Look up a header value by case-insensitive name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Whether a header with this name is present
    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(&name.to_ascii_lowercase())
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for WebhookHeaders {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

/// A webhook as seen by the parsers: headers plus the parsed JSON body
#[derive(Debug, Clone)]
pub struct WebhookInput {
    pub headers: WebhookHeaders,
    pub body: serde_json::Value,
}

impl WebhookInput {
    pub fn new(headers: WebhookHeaders, body: serde_json::Value) -> Self {
        Self { headers, body }
    }

    /// Parse a raw request body into a webhook input.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingEvent`] for an empty body and
    /// [`ParserError::MalformedPayload`] when the body is not JSON.
    pub fn from_bytes(headers: WebhookHeaders, body: &[u8]) -> Result<Self, ParserError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(ValidationError::MissingEvent.into());
        }

        let body = serde_json::from_slice(body).map_err(|e| ParserError::MalformedPayload {
            message: e.to_string(),
        })?;

        Ok(Self::new(headers, body))
    }
}

/// Provider-independent payload extracted by a parser
///
/// `time_resolved` and `title` are `None` when the handler does not deal with
/// them (changes); the assembler defaults them to empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedPayload {
    pub id: String,
    pub event_time: String,
    pub time_created: String,
    pub time_resolved: Option<String>,
    pub title: Option<String>,
    pub message: String,
}

impl NormalizedPayload {
    /// Marker written to every field of an unrecognised sub-event
    pub const UNKNOWN: &'static str = "UNKNOWN";

    /// Payload for a sub-event this system does not handle.
    pub fn unknown() -> Self {
        Self {
            id: Self::UNKNOWN.to_string(),
            event_time: Self::UNKNOWN.to_string(),
            time_created: Self::UNKNOWN.to_string(),
            time_resolved: Some(Self::UNKNOWN.to_string()),
            title: Some(Self::UNKNOWN.to_string()),
            message: Self::UNKNOWN.to_string(),
        }
    }

    /// Payload for a recognised sub-event that was deliberately filtered out.
    ///
    /// Distinct from [`NormalizedPayload::unknown`]: every field is empty.
    pub fn filtered() -> Self {
        Self {
            id: String::new(),
            event_time: String::new(),
            time_created: String::new(),
            time_resolved: Some(String::new()),
            title: Some(String::new()),
            message: String::new(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.id == Self::UNKNOWN
    }

    pub fn is_filtered(&self) -> bool {
        self.id.is_empty() && self.time_created.is_empty() && self.message.is_empty()
    }
}

/// Provider-specific happening a payload is dispatched on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubEvent {
    Push,
    Opened,
    Labeled,
    Closed,
    Unlabeled,
    Deleted,
    Unknown(String),
}

impl SubEvent {
    /// Map a GitHub-style action name
    pub fn from_action(action: &str) -> Self {
        match action {
            "opened" => Self::Opened,
            "labeled" => Self::Labeled,
            "closed" => Self::Closed,
            "unlabeled" => Self::Unlabeled,
            "deleted" => Self::Deleted,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// Identifies which provider a parser handles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Direct,
    Github,
    Bitbucket,
    Jira,
    Shortcut,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Github => "github",
            Self::Bitbucket => "bitbucket",
            Self::Jira => "jira",
            Self::Shortcut => "shortcut",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised while classifying or extracting a webhook
#[derive(Debug, thiserror::Error)]
pub enum ParserError {
    #[error("Missing event time: {context}")]
    MissingEventTime { context: String },

    #[error("Missing ID: {context}")]
    MissingId { context: String },

    #[error("Unknown event type: {event_type}")]
    UnknownEventType { event_type: String },

    #[error("Jira issue is missing its fields object")]
    MissingJiraFields,

    #[error("No Jira custom field references a GitHub or Bitbucket repository")]
    MissingJiraMatchedCustomFieldKey,

    #[error("Missing Shortcut fields: {message}")]
    MissingShortcutFields { message: String },

    #[error("Shortcut configuration error: {variable} - {message}")]
    ShortcutConfiguration { variable: String, message: String },

    #[error("Story fetch failed: {message}")]
    StoryFetch { status: Option<u16>, message: String },

    #[error("Malformed payload: {message}")]
    MalformedPayload { message: String },

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),
}

impl ParserError {
    /// Check if error is transient and may succeed on retry
    pub fn is_transient(&self) -> bool {
        match self {
            Self::StoryFetch { status, .. } => match status {
                None => true,
                Some(code) => *code == 429 || *code >= 500,
            },
            _ => false,
        }
    }

    /// Get error category for monitoring and response mapping
    pub fn error_category(&self) -> crate::ErrorCategory {
        match self {
            Self::ShortcutConfiguration { .. } => crate::ErrorCategory::Configuration,
            _ if self.is_transient() => crate::ErrorCategory::Transient,
            _ => crate::ErrorCategory::Permanent,
        }
    }
}

// ============================================================================
// Parser capability
// ============================================================================

/// Capability shared by every provider parser
///
/// Calls happen in the order `classify`, `extract_repo_name`,
/// `extract_payload`; all three may suspend (the Shortcut parser fetches the
/// story over the network).
#[async_trait]
pub trait EventParser: Send + Sync {
    /// Provider this parser handles
    fn provider(&self) -> Provider;

    /// Decide which canonical kind the webhook maps to.
    async fn classify(&self, input: &WebhookInput) -> Result<EventType, ParserError>;

    /// Extract the normalised payload for the webhook's sub-event.
    async fn extract_payload(&self, input: &WebhookInput)
        -> Result<NormalizedPayload, ParserError>;

    /// Extract the repository or product name the event belongs to.
    async fn extract_repo_name(&self, body: &serde_json::Value) -> Result<String, ParserError>;
}

// ============================================================================
// Shared payload handlers
// ============================================================================

/// Raw fields a parser pulled out of a webhook for one handler
#[derive(Debug, Clone, Default)]
pub(crate) struct PayloadParts {
    pub id: Option<String>,
    pub time_created: Option<String>,
    pub time_resolved: Option<String>,
    pub title: Option<String>,
    pub event_time: String,
    pub message: String,
}

impl PayloadParts {
    /// Parts stamped with the current time and the serialized body
    pub fn now(body: &serde_json::Value) -> Self {
        Self {
            event_time: time::now_millis().to_string(),
            message: body.to_string(),
            ..Self::default()
        }
    }
}

fn require_created(context: &str, parts: &PayloadParts) -> Result<String, ParserError> {
    let created = parts
        .time_created
        .as_deref()
        .ok_or_else(|| ParserError::MissingEventTime {
            context: format!("{} is missing its creation time", context),
        })?;
    Ok(time::to_unix_millis(created)?)
}

fn require_id(context: &str, parts: &PayloadParts) -> Result<String, ParserError> {
    parts.id.clone().ok_or_else(|| ParserError::MissingId {
        context: format!("{} is missing its ID", context),
    })
}

/// Push/change handler: needs a creation time and a commit (or story) id.
pub(crate) fn handle_change(
    context: &str,
    parts: PayloadParts,
) -> Result<NormalizedPayload, ParserError> {
    let time_created = require_created(context, &parts)?;
    let id = require_id(context, &parts)?;

    Ok(NormalizedPayload {
        id,
        event_time: parts.event_time,
        time_created,
        time_resolved: None,
        title: None,
        message: parts.message,
    })
}

/// Opened/labeled handler: an incident that is (again) open.
pub(crate) fn handle_opened(
    context: &str,
    parts: PayloadParts,
) -> Result<NormalizedPayload, ParserError> {
    let time_created = require_created(context, &parts)?;
    let id = require_id(context, &parts)?;

    Ok(NormalizedPayload {
        id,
        event_time: parts.event_time,
        time_created,
        time_resolved: Some(String::new()),
        title: Some(parts.title.unwrap_or_default()),
        message: parts.message,
    })
}

/// Closed/unlabeled/deleted handler: an incident that has been resolved.
pub(crate) fn handle_resolved(
    context: &str,
    parts: PayloadParts,
) -> Result<NormalizedPayload, ParserError> {
    let time_created = require_created(context, &parts)?;
    let resolved = parts
        .time_resolved
        .as_deref()
        .ok_or_else(|| ParserError::MissingEventTime {
            context: format!("{} is missing its resolution time", context),
        })?;
    let time_resolved = time::to_unix_millis(resolved)?;
    let id = require_id(context, &parts)?;

    Ok(NormalizedPayload {
        id,
        event_time: parts.event_time,
        time_created,
        time_resolved: Some(time_resolved),
        title: Some(parts.title.unwrap_or_default()),
        message: parts.message,
    })
}

// ============================================================================
// JSON helpers
// ============================================================================

/// Traverse a dot-separated JSON path and return a reference to the value.
///
/// Numeric segments index into arrays: `json_path(&body, "push.changes.0.new")`.
pub(crate) fn json_path<'a>(
    value: &'a serde_json::Value,
    path: &str,
) -> Option<&'a serde_json::Value> {
    path.split('.').try_fold(value, |current, key| match current {
        serde_json::Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => current.get(key),
    })
}

/// Read a JSON path as text; numbers are stringified, empty strings and
/// nulls are treated as absent.
pub(crate) fn json_text(value: &serde_json::Value, path: &str) -> Option<String> {
    match json_path(value, path)? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Whether the body carries no usable content (`null` or `{}`)
pub(crate) fn is_empty_body(body: &serde_json::Value) -> bool {
    match body {
        serde_json::Value::Null => true,
        serde_json::Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

// ============================================================================
// Module declarations
// ============================================================================

pub mod assembler;
pub mod bitbucket_parser;
pub mod direct_parser;
pub mod github_parser;
pub mod jira_parser;
pub mod selector;
pub mod shortcut_parser;

pub use assembler::{assemble, is_sentinel};
pub use bitbucket_parser::BitbucketParser;
pub use direct_parser::DirectParser;
pub use github_parser::GithubParser;
pub use jira_parser::JiraParser;
pub use selector::{ParserSelector, SHORTCUT_SIGNATURE_HEADER};
pub use shortcut_parser::{ApiToken, ShortcutParser, ShortcutSettings, StoryFetcher};

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
