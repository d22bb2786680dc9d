//! # In-Memory Repository Implementation
//!
//! Thread-safe in-memory [`Repository`] for development, tests and
//! single-instance deployments. Data does not survive a restart.

use crate::{
    repository::{Record, Repository, StorageError},
    time, CanonicalEvent, Change, Deployment, EventType, Incident, Metrics, TimeWindow,
};
use async_trait::async_trait;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use tracing::debug;

/// Arena key for value objects
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RecordKey {
    repo: String,
    kind: EventType,
    id: String,
}

impl RecordKey {
    fn of(record: &Record) -> Self {
        Self {
            repo: record.repo().to_string(),
            kind: record.kind(),
            id: record.id().to_string(),
        }
    }
}

/// In-memory repository backed by `RwLock`-guarded maps
///
/// Cloning shares the underlying storage.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    events: Arc<RwLock<Vec<CanonicalEvent>>>,
    records: Arc<RwLock<HashMap<RecordKey, Record>>>,
    last_deployed: Arc<RwLock<HashMap<String, Deployment>>>,
    metrics_cache: Option<Arc<RwLock<HashMap<(String, String), Metrics>>>>,
}

impl InMemoryRepository {
    /// Create an empty repository without a metrics cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty repository that caches full metrics results per
    /// `(repo, range)`
    pub fn with_metrics_cache() -> Self {
        Self {
            metrics_cache: Some(Arc::default()),
            ..Self::default()
        }
    }

    /// Snapshot of the raw event log, oldest first
    pub async fn events(&self) -> Vec<CanonicalEvent> {
        self.events.read().await.clone()
    }

    /// Number of stored value objects across all repos and kinds
    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }

    async fn upsert(&self, record: Record) {
        let repo = record.repo().to_string();
        let key = RecordKey::of(&record);
        debug!(repo = %key.repo, kind = %key.kind, id = %key.id, "Upserting record");
        self.records.write().await.insert(key, record);
        self.invalidate_cache(&repo).await;
    }

    /// New data makes every cached window of the repo stale
    async fn invalidate_cache(&self, repo: &str) {
        if let Some(cache) = &self.metrics_cache {
            cache.write().await.retain(|(cached_repo, _), _| cached_repo != repo);
        }
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn add_event(&self, event: &CanonicalEvent) -> Result<(), StorageError> {
        self.events.write().await.push(event.clone());
        Ok(())
    }

    async fn add_change(&self, change: &Change) -> Result<(), StorageError> {
        self.upsert(Record::Change(change.clone())).await;
        Ok(())
    }

    async fn add_deployment(
        &self,
        deployment: &Deployment,
        is_last_deployed_pointer: bool,
    ) -> Result<(), StorageError> {
        self.upsert(Record::Deployment(deployment.clone())).await;
        if is_last_deployed_pointer {
            self.last_deployed
                .write()
                .await
                .insert(deployment.repo().to_string(), deployment.clone());
        }
        Ok(())
    }

    async fn add_incident(&self, incident: &Incident) -> Result<(), StorageError> {
        self.upsert(Record::Incident(incident.clone())).await;
        Ok(())
    }

    async fn query_by_repo_and_kind(
        &self,
        repo: &str,
        kind: EventType,
        window: &TimeWindow,
    ) -> Result<Vec<Record>, StorageError> {
        let records = self.records.read().await;

        let mut matching: Vec<Record> = records
            .values()
            .filter(|record| {
                record.repo() == repo
                    && record.kind() == kind
                    && window.contains(record.time_created())
            })
            .cloned()
            .collect();
        matching.sort_by_key(|record| time::parse_millis(record.time_created()));

        Ok(matching)
    }

    async fn get_last_deployed_pointer(
        &self,
        repo: &str,
    ) -> Result<Option<Deployment>, StorageError> {
        Ok(self.last_deployed.read().await.get(repo).cloned())
    }

    async fn get_cached_metrics(
        &self,
        repo: &str,
        range_key: &str,
    ) -> Result<Option<Metrics>, StorageError> {
        let Some(cache) = &self.metrics_cache else {
            return Ok(None);
        };
        let key = (repo.to_string(), range_key.to_string());
        Ok(cache.read().await.get(&key).cloned())
    }

    async fn put_cached_metrics(
        &self,
        repo: &str,
        range_key: &str,
        metrics: &Metrics,
    ) -> Result<(), StorageError> {
        if let Some(cache) = &self.metrics_cache {
            cache.write().await.insert(
                (repo.to_string(), range_key.to_string()),
                metrics.clone(),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_repository_tests.rs"]
mod tests;
