//! # Repository Interface
//!
//! Persistence capability consumed by the use cases. Writes are upserts keyed
//! by `(repo, kind, id)`: storing an incident again with the same id replaces
//! the earlier record, which is how resolutions are recorded.
//!
//! The in-memory implementation lives in
//! [`adapters::memory_repository`](crate::adapters::memory_repository).

use crate::{CanonicalEvent, Change, Deployment, EventType, Incident, Metrics, TimeWindow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ============================================================================
// Records
// ============================================================================

/// A stored value object of any kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Record {
    Change(Change),
    Deployment(Deployment),
    Incident(Incident),
}

impl Record {
    pub fn kind(&self) -> EventType {
        match self {
            Self::Change(_) => EventType::Change,
            Self::Deployment(_) => EventType::Deployment,
            Self::Incident(_) => EventType::Incident,
        }
    }

    pub fn repo(&self) -> &str {
        match self {
            Self::Change(c) => c.repo(),
            Self::Deployment(d) => d.repo(),
            Self::Incident(i) => i.repo(),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Change(c) => c.id(),
            Self::Deployment(d) => d.id(),
            Self::Incident(i) => i.id(),
        }
    }

    pub fn time_created(&self) -> &str {
        match self {
            Self::Change(c) => c.time_created(),
            Self::Deployment(d) => d.time_created(),
            Self::Incident(i) => i.time_created(),
        }
    }
}

/// Records of one repo split by kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSet {
    pub changes: Vec<Change>,
    pub deployments: Vec<Deployment>,
    pub incidents: Vec<Incident>,
}

impl FromIterator<Record> for RecordSet {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        let mut set = Self::default();
        for record in iter {
            match record {
                Record::Change(c) => set.changes.push(c),
                Record::Deployment(d) => set.deployments.push(d),
                Record::Incident(i) => set.incidents.push(i),
            }
        }
        set
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised by repository implementations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The backing store rejected or failed the operation
    #[error("Storage operation '{operation}' failed: {message}")]
    OperationFailed { operation: String, message: String },

    /// The backing store cannot be reached
    #[error("Storage unavailable: {message}")]
    Unavailable { message: String },

    /// A record could not be encoded or decoded
    #[error("Serialization failed: {message}")]
    Serialization { message: String },
}

impl StorageError {
    /// Check if error is transient and worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            message: e.to_string(),
        }
    }
}

// ============================================================================
// Core Trait
// ============================================================================

/// Storage for raw events, value objects, the last-deployment pointer and the
/// optional metrics cache
#[async_trait]
pub trait Repository: Send + Sync {
    /// Append the raw canonical event to the audit log
    async fn add_event(&self, event: &CanonicalEvent) -> Result<(), StorageError>;

    /// Upsert a change
    async fn add_change(&self, change: &Change) -> Result<(), StorageError>;

    /// Upsert a deployment, optionally also moving the repo's last-deployment
    /// pointer to it
    async fn add_deployment(
        &self,
        deployment: &Deployment,
        is_last_deployed_pointer: bool,
    ) -> Result<(), StorageError>;

    /// Upsert an incident
    async fn add_incident(&self, incident: &Incident) -> Result<(), StorageError>;

    /// Records of one kind whose `timeCreated` lies inside `window`
    /// (inclusive), ordered by `timeCreated`
    async fn query_by_repo_and_kind(
        &self,
        repo: &str,
        kind: EventType,
        window: &TimeWindow,
    ) -> Result<Vec<Record>, StorageError>;

    /// The most recent deployment recorded with the pointer flag
    async fn get_last_deployed_pointer(
        &self,
        repo: &str,
    ) -> Result<Option<Deployment>, StorageError>;

    /// Cached metrics for `(repo, range_key)`; repositories without a cache
    /// always miss
    async fn get_cached_metrics(
        &self,
        _repo: &str,
        _range_key: &str,
    ) -> Result<Option<Metrics>, StorageError> {
        Ok(None)
    }

    /// Store metrics for `(repo, range_key)`; a no-op without a cache
    async fn put_cached_metrics(
        &self,
        _repo: &str,
        _range_key: &str,
        _metrics: &Metrics,
    ) -> Result<(), StorageError> {
        Ok(())
    }
}
