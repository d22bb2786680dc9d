//! Tests for the use cases.

use super::*;
use crate::{
    repository::{Record, StorageError},
    DoraError, InMemoryRepository,
};
use async_trait::async_trait;

const HOUR_MS: i64 = 3_600_000;

fn event(event_type: EventType, id: &str, created: i64) -> CanonicalEvent {
    CanonicalEvent {
        repo: "acme/checkout".to_string(),
        event_type: Some(event_type),
        id: id.to_string(),
        time_created: created.to_string(),
        ..CanonicalEvent::default()
    }
}

fn deployment_event(id: &str, change_sha: &str, created: i64) -> CanonicalEvent {
    CanonicalEvent {
        change_sha: change_sha.to_string(),
        ..event(EventType::Deployment, id, created)
    }
}

fn week_request() -> MetricsRequest {
    MetricsRequest::new("acme/checkout", TimeWindow::from_millis(0, 7 * 24 * HOUR_MS))
}

/// Repository whose every call fails
struct UnavailableRepository;

#[async_trait]
impl Repository for UnavailableRepository {
    async fn add_event(&self, _event: &CanonicalEvent) -> Result<(), StorageError> {
        Err(StorageError::Unavailable {
            message: "down".to_string(),
        })
    }

    async fn add_change(&self, _change: &Change) -> Result<(), StorageError> {
        unreachable!("raw event is written first")
    }

    async fn add_deployment(&self, _: &Deployment, _: bool) -> Result<(), StorageError> {
        unreachable!("raw event is written first")
    }

    async fn add_incident(&self, _incident: &Incident) -> Result<(), StorageError> {
        unreachable!("raw event is written first")
    }

    async fn query_by_repo_and_kind(
        &self,
        _repo: &str,
        _kind: EventType,
        _window: &TimeWindow,
    ) -> Result<Vec<Record>, StorageError> {
        Err(StorageError::Unavailable {
            message: "down".to_string(),
        })
    }

    async fn get_last_deployed_pointer(
        &self,
        _repo: &str,
    ) -> Result<Option<Deployment>, StorageError> {
        Err(StorageError::OperationFailed {
            operation: "get".to_string(),
            message: "corrupt".to_string(),
        })
    }
}

// ============================================================================
// create_event
// ============================================================================

#[tokio::test]
async fn test_create_event_stores_raw_event_and_projection() {
    let repository = InMemoryRepository::new();

    create_event(&repository, &event(EventType::Change, "c1", 1_000))
        .await
        .unwrap();

    assert_eq!(repository.events().await.len(), 1);
    assert_eq!(repository.record_count().await, 1);
}

#[tokio::test]
async fn test_create_deployment_moves_pointer() {
    let repository = InMemoryRepository::new();

    create_event(&repository, &deployment_event("d1", "c1", 1_000))
        .await
        .unwrap();

    let last = get_last_deployment(&repository, "acme/checkout")
        .await
        .unwrap();
    assert_eq!(
        last,
        LastDeployment {
            id: "d1".to_string(),
            time_created: "1000".to_string(),
        }
    );
}

#[tokio::test]
async fn test_create_event_requires_id_and_event_type() {
    let repository = InMemoryRepository::new();

    let mut missing_id = event(EventType::Change, "", 1_000);
    let result = create_event(&repository, &missing_id).await;
    assert!(matches!(
        result,
        Err(DoraError::Validation(ValidationError::MissingEventMetadata { ref field })) if field == "id"
    ));

    missing_id.id = "c1".to_string();
    missing_id.event_type = None;
    let result = create_event(&repository, &missing_id).await;
    assert!(matches!(
        result,
        Err(DoraError::Validation(ValidationError::MissingEventMetadata { ref field })) if field == "eventType"
    ));

    assert!(repository.events().await.is_empty());
}

#[tokio::test]
async fn test_projection_error_after_raw_event_is_reported() {
    let repository = InMemoryRepository::new();
    let mut no_repo = event(EventType::Incident, "i1", 1_000);
    no_repo.repo = String::new();

    let result = create_event(&repository, &no_repo).await;

    assert!(matches!(
        result,
        Err(DoraError::Validation(ValidationError::MissingRepoName))
    ));
    assert_eq!(repository.events().await.len(), 1);
    assert_eq!(repository.record_count().await, 0);
}

#[tokio::test]
async fn test_storage_errors_propagate_unchanged() {
    let result = create_event(&UnavailableRepository, &event(EventType::Change, "c1", 1)).await;

    let error = result.unwrap_err();
    assert!(matches!(error, DoraError::Storage(StorageError::Unavailable { .. })));
    assert!(error.is_transient());
}

// ============================================================================
// get_metrics
// ============================================================================

#[tokio::test]
async fn test_get_metrics_over_stored_events() {
    let repository = InMemoryRepository::new();
    for event in [
        event(EventType::Change, "c1", HOUR_MS),
        deployment_event("d1", "c1", 2 * HOUR_MS),
        event(EventType::Incident, "i1", 3 * HOUR_MS),
    ] {
        create_event(&repository, &event).await.unwrap();
    }

    let metrics = get_metrics(&repository, &week_request(), 4 * HOUR_MS)
        .await
        .unwrap();

    assert_eq!(metrics.total.changes_count, 1);
    assert_eq!(metrics.total.deployment_count, 1);
    assert_eq!(metrics.total.incident_count, 1);
    assert_eq!(metrics.metrics.deployment_frequency.as_deref(), Some("0.14"));
    assert_eq!(
        metrics.metrics.lead_time_for_changes.as_deref(),
        Some("00:01:00:00")
    );
    assert_eq!(metrics.metrics.change_failure_rate.as_deref(), Some("1.00"));
    // Still open: measured up to "now"
    assert_eq!(
        metrics.metrics.time_to_restore_services.as_deref(),
        Some("00:01:00:00")
    );
}

#[tokio::test]
async fn test_get_metrics_honours_selection() {
    let repository = InMemoryRepository::new();
    let request =
        week_request().with_selection(MetricSelection::only([MetricKind::DeploymentFrequency]));

    let metrics = get_metrics(&repository, &request, 0).await.unwrap();

    assert_eq!(metrics.metrics.deployment_frequency.as_deref(), Some("0.00"));
    assert_eq!(metrics.metrics.lead_time_for_changes, None);
    assert_eq!(metrics.metrics.change_failure_rate, None);
    assert_eq!(metrics.metrics.time_to_restore_services, None);
}

#[tokio::test]
async fn test_full_results_are_cached_and_served() {
    let repository = InMemoryRepository::with_metrics_cache();
    create_event(&repository, &deployment_event("d1", "c1", HOUR_MS))
        .await
        .unwrap();

    let first = get_metrics(&repository, &week_request(), 0).await.unwrap();
    let range_key = week_request().window.range_key();
    let cached = repository
        .get_cached_metrics("acme/checkout", &range_key)
        .await
        .unwrap();
    assert_eq!(cached.as_ref(), Some(&first));

    // A partial request is served from the cached full result
    let request = week_request().with_selection(MetricSelection::only([MetricKind::ChangeFailureRate]));
    let partial = get_metrics(&repository, &request, 0).await.unwrap();
    assert_eq!(partial.metrics.change_failure_rate.as_deref(), Some("0.00"));
    assert_eq!(partial.metrics.deployment_frequency, None);
}

/// Restore time for an open incident grows with the clock, so a later
/// request must recompute it.
#[tokio::test]
async fn test_results_with_open_incident_are_not_cached() {
    let repository = InMemoryRepository::with_metrics_cache();
    create_event(&repository, &event(EventType::Incident, "i1", HOUR_MS))
        .await
        .unwrap();

    let first = get_metrics(&repository, &week_request(), 2 * HOUR_MS)
        .await
        .unwrap();
    assert!(repository
        .get_cached_metrics("acme/checkout", &week_request().window.range_key())
        .await
        .unwrap()
        .is_none());

    let later = get_metrics(&repository, &week_request(), 3 * HOUR_MS)
        .await
        .unwrap();
    assert_eq!(
        first.metrics.time_to_restore_services.as_deref(),
        Some("00:01:00:00")
    );
    assert_eq!(
        later.metrics.time_to_restore_services.as_deref(),
        Some("00:02:00:00")
    );
}

#[tokio::test]
async fn test_partial_results_are_not_cached() {
    let repository = InMemoryRepository::with_metrics_cache();
    let request = week_request().with_selection(MetricSelection::only([MetricKind::ChangeFailureRate]));

    get_metrics(&repository, &request, 0).await.unwrap();

    assert!(repository
        .get_cached_metrics("acme/checkout", &request.window.range_key())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_get_metrics_propagates_storage_errors() {
    let result = get_metrics(&UnavailableRepository, &week_request(), 0).await;
    assert!(matches!(result, Err(DoraError::Storage(_))));
}

// ============================================================================
// get_last_deployment
// ============================================================================

#[tokio::test]
async fn test_last_deployment_is_empty_without_deployments() {
    let repository = InMemoryRepository::new();
    let last = get_last_deployment(&repository, "acme/checkout")
        .await
        .unwrap();
    assert_eq!(last, LastDeployment::default());
    assert_eq!(last.id, "");
}

#[tokio::test]
async fn test_last_deployment_propagates_storage_errors() {
    let result = get_last_deployment(&UnavailableRepository, "acme/checkout").await;
    assert!(matches!(
        result,
        Err(DoraError::Storage(StorageError::OperationFailed { .. }))
    ));
}
