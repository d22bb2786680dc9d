//! # Canonical Events and Value Objects
//!
//! [`CanonicalEvent`] is the provider-independent record every webhook is
//! assembled into. [`Change`], [`Deployment`] and [`Incident`] are the narrower,
//! immutable projections persisted per event kind; they are built with
//! `TryFrom<&CanonicalEvent>`.

use crate::{time, EventType, ValidationError};
use serde::{Deserialize, Serialize};

// ============================================================================
// CanonicalEvent
// ============================================================================

/// Normalised webhook event produced by the event assembler
///
/// All timestamps are Unix-millisecond strings. Optional fields are empty
/// strings when the provider does not supply them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalEvent {
    pub repo: String,
    pub event_type: Option<EventType>,
    pub id: String,
    pub change_sha: String,
    pub event_time: String,
    pub time_created: String,
    pub time_resolved: String,
    pub title: String,
    pub message: String,
    pub date: String,
}

/// Check the three identity fields every projection requires, in order.
fn require_identity(event: &CanonicalEvent) -> Result<EventType, ValidationError> {
    if event.repo.is_empty() {
        return Err(ValidationError::MissingRepoName);
    }

    let event_type = event.event_type.ok_or(ValidationError::MissingEventType)?;

    if event.id.is_empty() {
        return Err(ValidationError::MissingId);
    }

    Ok(event_type)
}

// ============================================================================
// Change
// ============================================================================

/// A code change (push/commit) reaching version control
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    repo: String,
    event_type: EventType,
    id: String,
    time_created: String,
    date: String,
}

impl Change {
    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn time_created(&self) -> &str {
        &self.time_created
    }

    pub fn date(&self) -> &str {
        &self.date
    }
}

impl TryFrom<&CanonicalEvent> for Change {
    type Error = ValidationError;

    fn try_from(event: &CanonicalEvent) -> Result<Self, Self::Error> {
        let event_type = require_identity(event)?;

        Ok(Self {
            repo: event.repo.clone(),
            event_type,
            id: event.id.clone(),
            time_created: event.time_created.clone(),
            date: time::local_date_stamp(),
        })
    }
}

// ============================================================================
// Deployment
// ============================================================================

/// A release to production, linked to its triggering change by `change_sha`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    repo: String,
    event_type: EventType,
    id: String,
    change_sha: String,
    time_created: String,
    date: String,
}

impl Deployment {
    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// SHA of the change this deployment shipped; empty when unknown
    pub fn change_sha(&self) -> &str {
        &self.change_sha
    }

    pub fn time_created(&self) -> &str {
        &self.time_created
    }

    pub fn date(&self) -> &str {
        &self.date
    }
}

impl TryFrom<&CanonicalEvent> for Deployment {
    type Error = ValidationError;

    fn try_from(event: &CanonicalEvent) -> Result<Self, Self::Error> {
        let event_type = require_identity(event)?;

        Ok(Self {
            repo: event.repo.clone(),
            event_type,
            id: event.id.clone(),
            change_sha: event.change_sha.clone(),
            time_created: event.time_created.clone(),
            date: time::local_date_stamp(),
        })
    }
}

// ============================================================================
// Incident
// ============================================================================

/// A production incident; `time_resolved` is empty while it is open
///
/// Resolution is recorded by storing a new `Incident` with the same `id`,
/// which replaces the open record in the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    repo: String,
    event_type: EventType,
    id: String,
    time_created: String,
    time_resolved: String,
    title: String,
    date: String,
}

impl Incident {
    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn time_created(&self) -> &str {
        &self.time_created
    }

    pub fn time_resolved(&self) -> &str {
        &self.time_resolved
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    /// Whether a resolution timestamp has been recorded
    pub fn is_resolved(&self) -> bool {
        !self.time_resolved.is_empty()
    }
}

impl TryFrom<&CanonicalEvent> for Incident {
    type Error = ValidationError;

    fn try_from(event: &CanonicalEvent) -> Result<Self, Self::Error> {
        let event_type = require_identity(event)?;

        Ok(Self {
            repo: event.repo.clone(),
            event_type,
            id: event.id.clone(),
            time_created: event.time_created.clone(),
            time_resolved: event.time_resolved.clone(),
            title: event.title.clone(),
            date: time::local_date_stamp(),
        })
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
