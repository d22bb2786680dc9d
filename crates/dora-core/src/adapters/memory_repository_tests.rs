//! Tests for the in-memory repository.

use super::*;
use crate::metrics::{MetricValues, Totals};

fn event(event_type: EventType, repo: &str, id: &str, created: i64) -> CanonicalEvent {
    CanonicalEvent {
        repo: repo.to_string(),
        event_type: Some(event_type),
        id: id.to_string(),
        change_sha: "c1".to_string(),
        time_created: created.to_string(),
        ..CanonicalEvent::default()
    }
}

fn incident(id: &str, created: i64, resolved: &str) -> Incident {
    let mut event = event(EventType::Incident, "acme/checkout", id, created);
    event.time_resolved = resolved.to_string();
    event.title = "Outage".to_string();
    Incident::try_from(&event).unwrap()
}

fn metrics(repo: &str) -> Metrics {
    Metrics {
        repo: repo.to_string(),
        period: TimeWindow::new("0", "1"),
        total: Totals::default(),
        metrics: MetricValues::default(),
    }
}

/// Every value object comes back equal after a store/query round trip.
#[tokio::test]
async fn test_round_trip_per_kind() {
    let repository = InMemoryRepository::new();
    let window = TimeWindow::from_millis(0, 10_000);

    let change = Change::try_from(&event(EventType::Change, "acme/checkout", "c1", 1_000)).unwrap();
    let deployment =
        Deployment::try_from(&event(EventType::Deployment, "acme/checkout", "d1", 2_000)).unwrap();
    let incident = incident("i1", 3_000, "4000");

    repository.add_change(&change).await.unwrap();
    repository.add_deployment(&deployment, false).await.unwrap();
    repository.add_incident(&incident).await.unwrap();

    let changes = repository
        .query_by_repo_and_kind("acme/checkout", EventType::Change, &window)
        .await
        .unwrap();
    let deployments = repository
        .query_by_repo_and_kind("acme/checkout", EventType::Deployment, &window)
        .await
        .unwrap();
    let incidents = repository
        .query_by_repo_and_kind("acme/checkout", EventType::Incident, &window)
        .await
        .unwrap();

    assert_eq!(changes, vec![Record::Change(change)]);
    assert_eq!(deployments, vec![Record::Deployment(deployment)]);
    assert_eq!(incidents, vec![Record::Incident(incident)]);
}

#[tokio::test]
async fn test_query_filters_repo_and_window_and_sorts() {
    let repository = InMemoryRepository::new();

    for (repo, id, created) in [
        ("acme/checkout", "late", 9_000),
        ("acme/checkout", "early", 1_000),
        ("acme/checkout", "outside", 20_000),
        ("acme/other", "other-repo", 2_000),
    ] {
        let change = Change::try_from(&event(EventType::Change, repo, id, created)).unwrap();
        repository.add_change(&change).await.unwrap();
    }

    let records = repository
        .query_by_repo_and_kind(
            "acme/checkout",
            EventType::Change,
            &TimeWindow::from_millis(1_000, 10_000),
        )
        .await
        .unwrap();

    let ids: Vec<_> = records.iter().map(Record::id).collect();
    assert_eq!(ids, vec!["early", "late"]);
}

#[tokio::test]
async fn test_incident_upsert_replaces_open_record() {
    let repository = InMemoryRepository::new();
    let window = TimeWindow::from_millis(0, 10_000);

    repository
        .add_incident(&incident("i1", 1_000, ""))
        .await
        .unwrap();
    repository
        .add_incident(&incident("i1", 1_000, "5000"))
        .await
        .unwrap();

    let incidents = repository
        .query_by_repo_and_kind("acme/checkout", EventType::Incident, &window)
        .await
        .unwrap();

    assert_eq!(incidents.len(), 1);
    match &incidents[0] {
        Record::Incident(incident) => assert_eq!(incident.time_resolved(), "5000"),
        other => panic!("expected incident, got {:?}", other),
    }
}

#[tokio::test]
async fn test_last_deployed_pointer_only_moves_when_flagged() {
    let repository = InMemoryRepository::new();
    let first =
        Deployment::try_from(&event(EventType::Deployment, "acme/checkout", "d1", 1_000)).unwrap();
    let second =
        Deployment::try_from(&event(EventType::Deployment, "acme/checkout", "d2", 2_000)).unwrap();

    assert_eq!(
        repository
            .get_last_deployed_pointer("acme/checkout")
            .await
            .unwrap(),
        None
    );

    repository.add_deployment(&first, true).await.unwrap();
    repository.add_deployment(&second, false).await.unwrap();

    let last = repository
        .get_last_deployed_pointer("acme/checkout")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(last.id(), "d1");
    assert_eq!(repository.record_count().await, 2);
}

#[tokio::test]
async fn test_event_log_is_append_only() {
    let repository = InMemoryRepository::new();
    let raw = event(EventType::Change, "acme/checkout", "c1", 1_000);

    repository.add_event(&raw).await.unwrap();
    repository.add_event(&raw).await.unwrap();

    assert_eq!(repository.events().await, vec![raw.clone(), raw]);
}

#[tokio::test]
async fn test_cache_disabled_always_misses() {
    let repository = InMemoryRepository::new();
    repository
        .put_cached_metrics("acme/checkout", "0_1", &metrics("acme/checkout"))
        .await
        .unwrap();

    assert!(repository
        .get_cached_metrics("acme/checkout", "0_1")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_cache_is_invalidated_by_new_records() {
    let repository = InMemoryRepository::with_metrics_cache();
    repository
        .put_cached_metrics("acme/checkout", "0_1", &metrics("acme/checkout"))
        .await
        .unwrap();
    repository
        .put_cached_metrics("acme/other", "0_1", &metrics("acme/other"))
        .await
        .unwrap();

    assert!(repository
        .get_cached_metrics("acme/checkout", "0_1")
        .await
        .unwrap()
        .is_some());

    let change = Change::try_from(&event(EventType::Change, "acme/checkout", "c1", 0)).unwrap();
    repository.add_change(&change).await.unwrap();

    assert!(repository
        .get_cached_metrics("acme/checkout", "0_1")
        .await
        .unwrap()
        .is_none());
    assert!(repository
        .get_cached_metrics("acme/other", "0_1")
        .await
        .unwrap()
        .is_some());
}
