//! # Use Cases
//!
//! Orchestration between the parsers, value objects, metrics engine and a
//! [`Repository`].

use crate::{
    metrics::MetricValues,
    repository::{RecordSet, Repository},
    CanonicalEvent, Change, Deployment, DoraResult, EventType, Incident, MetricKind,
    MetricSelection, Metrics, MetricsEngine, TimeWindow, ValidationError,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

// ============================================================================
// CreateEvent
// ============================================================================

/// Persist a canonical event and its value-object projection.
///
/// The raw event is written first, then exactly one of change, deployment or
/// incident. Deployments also move the repo's last-deployment pointer.
///
/// # Errors
///
/// - [`ValidationError::MissingEventMetadata`] when `id` or `eventType` is missing
/// - the projection's validation error (e.g. missing repo)
/// - any [`StorageError`](crate::StorageError), unchanged
#[instrument(skip(repository, event), fields(repo = %event.repo, id = %event.id))]
pub async fn create_event(repository: &dyn Repository, event: &CanonicalEvent) -> DoraResult<()> {
    if event.id.is_empty() {
        return Err(ValidationError::MissingEventMetadata {
            field: "id".to_string(),
        }
        .into());
    }
    let event_type = event
        .event_type
        .ok_or_else(|| ValidationError::MissingEventMetadata {
            field: "eventType".to_string(),
        })?;

    repository.add_event(event).await?;

    match event_type {
        EventType::Change => {
            let change = Change::try_from(event)?;
            repository.add_change(&change).await?;
        }
        EventType::Deployment => {
            let deployment = Deployment::try_from(event)?;
            repository.add_deployment(&deployment, true).await?;
        }
        EventType::Incident => {
            let incident = Incident::try_from(event)?;
            repository.add_incident(&incident).await?;
        }
    }

    info!(event_type = %event_type, "Event stored");
    Ok(())
}

// ============================================================================
// GetMetrics
// ============================================================================

/// A validated metrics query
///
/// The window bounds are Unix-millisecond strings with any timezone offset
/// already applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsRequest {
    pub repo: String,
    pub window: TimeWindow,
    pub selection: MetricSelection,
}

impl MetricsRequest {
    pub fn new(repo: impl Into<String>, window: TimeWindow) -> Self {
        Self {
            repo: repo.into(),
            window,
            selection: MetricSelection::all(),
        }
    }

    pub fn with_selection(mut self, selection: MetricSelection) -> Self {
        self.selection = selection;
        self
    }
}

/// Compute metrics for a repo and window.
///
/// The repository cache is consulted first. Only full computations are
/// written back, so a cached entry always holds all four metrics. Results
/// covering a still-open incident are never cached.
///
/// # Errors
///
/// Propagates repository failures.
#[instrument(skip(repository, request), fields(repo = %request.repo, range = %request.window.range_key()))]
pub async fn get_metrics(
    repository: &dyn Repository,
    request: &MetricsRequest,
    now_millis: i64,
) -> DoraResult<Metrics> {
    let range_key = request.window.range_key();

    if let Some(cached) = repository
        .get_cached_metrics(&request.repo, &range_key)
        .await?
    {
        debug!("Metrics cache hit");
        return Ok(restrict(cached, &request.selection));
    }

    let mut records = Vec::new();
    for kind in [EventType::Change, EventType::Deployment, EventType::Incident] {
        records.extend(
            repository
                .query_by_repo_and_kind(&request.repo, kind, &request.window)
                .await?,
        );
    }
    let records: RecordSet = records.into_iter().collect();

    let metrics = MetricsEngine::new(
        &records.changes,
        &records.deployments,
        &records.incidents,
        &request.window,
    )
    .with_now(now_millis)
    .compute(&request.repo, &request.selection);

    // Open incidents age with the clock, so their restore time cannot be reused
    let has_open_incident = records.incidents.iter().any(|i| !i.is_resolved());
    if request.selection.is_all() && !has_open_incident {
        repository
            .put_cached_metrics(&request.repo, &range_key, &metrics)
            .await?;
    }

    Ok(metrics)
}

/// Drop the metric values a request did not ask for
fn restrict(mut metrics: Metrics, selection: &MetricSelection) -> Metrics {
    let MetricValues {
        deployment_frequency,
        lead_time_for_changes,
        change_failure_rate,
        time_to_restore_services,
    } = metrics.metrics;

    metrics.metrics = MetricValues {
        deployment_frequency: deployment_frequency
            .filter(|_| selection.contains(MetricKind::DeploymentFrequency)),
        lead_time_for_changes: lead_time_for_changes
            .filter(|_| selection.contains(MetricKind::LeadTimeForChanges)),
        change_failure_rate: change_failure_rate
            .filter(|_| selection.contains(MetricKind::ChangeFailureRate)),
        time_to_restore_services: time_to_restore_services
            .filter(|_| selection.contains(MetricKind::TimeToRestoreServices)),
    };
    metrics
}

// ============================================================================
// GetLastDeployment
// ============================================================================

/// Id and creation time of a repo's most recent deployment
///
/// Both fields are empty when the repo has never deployed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastDeployment {
    pub id: String,
    pub time_created: String,
}

/// Look up the last-deployment pointer for `repo`.
///
/// # Errors
///
/// Propagates repository failures.
#[instrument(skip(repository))]
pub async fn get_last_deployment(
    repository: &dyn Repository,
    repo: &str,
) -> DoraResult<LastDeployment> {
    let last = repository
        .get_last_deployed_pointer(repo)
        .await?
        .map(|deployment| LastDeployment {
            id: deployment.id().to_string(),
            time_created: deployment.time_created().to_string(),
        })
        .unwrap_or_default();

    Ok(last)
}

#[cfg(test)]
#[path = "usecases_tests.rs"]
mod tests;
