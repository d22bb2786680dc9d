//! # Dora Core
//!
//! Core business logic for the DORA metrics service.
//!
//! This crate turns webhook payloads from GitHub, Bitbucket, Jira, Shortcut and
//! direct API calls into canonical `change`, `deployment` and `incident` events,
//! and computes the four DORA metrics over stored events.
//!
//! ## Architecture
//!
//! - Provider parsers implement the [`webhook::EventParser`] trait and are
//!   chosen per request by [`webhook::ParserSelector`]
//! - Persistence is abstracted behind [`repository::Repository`]; the
//!   in-memory adapter lives in [`adapters`]
//! - The metrics engine is pure computation over already-loaded records
//!
//! ## Usage
//!
//! ```rust
//! use dora_core::time::prettify;
//!
//! assert_eq!(prettify(3661), "00:01:01:01");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Standard result type for core operations
pub type DoraResult<T> = Result<T, DoraError>;

// ============================================================================
// Event Kinds
// ============================================================================

/// The three canonical event kinds every webhook is normalised into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Change,
    Deployment,
    Incident,
}

impl EventType {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Change => "change",
            Self::Deployment => "deployment",
            Self::Incident => "incident",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "change" => Ok(Self::Change),
            "deployment" => Ok(Self::Deployment),
            "incident" => Ok(Self::Incident),
            "" => Err(ValidationError::MissingEventType),
            other => Err(ValidationError::InvalidEventType {
                value: other.to_string(),
            }),
        }
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// High-level error categorization for response mapping and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Temporary failures that may succeed on retry
    Transient,
    /// Permanent failures caused by the input
    Permanent,
    /// Configuration errors preventing processing
    Configuration,
}

/// Missing or malformed fields on events and value objects
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("Missing repository name")]
    MissingRepoName,

    #[error("Missing event type")]
    MissingEventType,

    #[error("Invalid event type: '{value}'")]
    InvalidEventType { value: String },

    #[error("Missing ID")]
    MissingId,

    #[error("Missing time: {context}")]
    MissingTime { context: String },

    #[error("Invalid time: '{value}' is not a recognised date representation")]
    InvalidTime { value: String },

    #[error("Missing event in request")]
    MissingEvent,

    #[error("Missing event metadata: {field}")]
    MissingEventMetadata { field: String },
}

/// Top-level error type returned by the use cases
#[derive(Debug, thiserror::Error)]
pub enum DoraError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Parser error: {0}")]
    Parser(#[from] webhook::ParserError),

    #[error("Storage error: {0}")]
    Storage(#[from] repository::StorageError),
}

impl DoraError {
    /// Check if error is transient and may succeed on retry
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Validation(_) => false,
            Self::Parser(parser_error) => parser_error.is_transient(),
            Self::Storage(storage_error) => storage_error.is_transient(),
        }
    }

    /// Get error category for monitoring and response mapping
    pub fn error_category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::Permanent,
            Self::Parser(parser_error) => parser_error.error_category(),
            Self::Storage(storage_error) => {
                if storage_error.is_transient() {
                    ErrorCategory::Transient
                } else {
                    ErrorCategory::Permanent
                }
            }
        }
    }
}

// ============================================================================
// Module declarations
// ============================================================================

/// Timestamp conversion and duration formatting
pub mod time;

/// Canonical event and the change/deployment/incident value objects
pub mod events;

/// Provider parsers, parser selection and canonical event assembly
pub mod webhook;

/// DORA metrics computation
pub mod metrics;

/// Persistence abstraction consumed by the use cases
pub mod repository;

/// Create-event, get-metrics and last-deployment orchestration
pub mod usecases;

/// Infrastructure implementations of the repository and story API
pub mod adapters;

// Re-export key types for convenience
pub use adapters::{HttpStoryClient, InMemoryRepository};
pub use events::{CanonicalEvent, Change, Deployment, Incident};
pub use metrics::{MetricKind, MetricSelection, Metrics, MetricsEngine, TimeWindow};
pub use repository::{Record, Repository, StorageError};
pub use usecases::{create_event, get_last_deployment, get_metrics, LastDeployment, MetricsRequest};
pub use webhook::{EventParser, ParserError, ParserSelector, Provider, WebhookHeaders, WebhookInput};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
