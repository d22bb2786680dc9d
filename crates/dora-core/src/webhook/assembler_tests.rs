//! Tests for [`assemble`].

use super::*;
use crate::webhook::{DirectParser, GithubParser, WebhookHeaders};
use crate::EventType;
use serde_json::json;

#[tokio::test]
async fn test_direct_deployment_is_assembled() {
    let body = json!({
        "eventType": "deployment",
        "repo": "acme/checkout",
        "id": "deploy-1",
        "changeSha": "3cd8a5b",
        "timeCreated": "2024-01-01T00:00:00Z"
    });
    let input = WebhookInput::new(WebhookHeaders::new(), body);

    let event = assemble(&DirectParser::new(), &input).await.unwrap();

    assert_eq!(event.repo, "acme/checkout");
    assert_eq!(event.event_type, Some(EventType::Deployment));
    assert_eq!(event.id, "deploy-1");
    assert_eq!(event.change_sha, "3cd8a5b");
    assert_eq!(event.time_created, "1704067200000");
    assert_eq!(event.time_resolved, "");
    assert_eq!(event.date, time::local_date_stamp());
    assert!(!is_sentinel(&event));
}

#[tokio::test]
async fn test_change_defaults_optional_fields() {
    let headers: WebhookHeaders = [("X-GitHub-Event", "push")].into_iter().collect();
    let body = json!({
        "head_commit": { "id": "abc123", "timestamp": "2021-12-06T16:22:44Z" },
        "repository": { "full_name": "acme/checkout" }
    });

    let event = assemble(&GithubParser::new(), &WebhookInput::new(headers, body))
        .await
        .unwrap();

    assert_eq!(event.event_type, Some(EventType::Change));
    assert_eq!(event.change_sha, "");
    assert_eq!(event.time_resolved, "");
    assert_eq!(event.title, "");
}

#[tokio::test]
async fn test_classification_error_stops_assembly() {
    let headers: WebhookHeaders = [("X-GitHub-Event", "star")].into_iter().collect();
    let input = WebhookInput::new(headers, json!({}));

    let result = assemble(&GithubParser::new(), &input).await;
    assert!(matches!(result, Err(ParserError::UnknownEventType { .. })));
}

#[tokio::test]
async fn test_filtered_and_unknown_payloads_are_sentinels() {
    let headers: WebhookHeaders = [("X-GitHub-Event", "issues")].into_iter().collect();
    let filtered = json!({
        "action": "opened",
        "issue": { "id": 1, "labels": [], "created_at": "2021-12-06T16:22:44Z" },
        "repository": { "full_name": "acme/checkout" }
    });
    let unknown = json!({
        "action": "assigned",
        "repository": { "full_name": "acme/checkout" }
    });

    let parser = GithubParser::new();
    let filtered = assemble(&parser, &WebhookInput::new(headers.clone(), filtered))
        .await
        .unwrap();
    let unknown = assemble(&parser, &WebhookInput::new(headers, unknown))
        .await
        .unwrap();

    assert!(is_sentinel(&filtered));
    assert_eq!(filtered.id, "");
    assert!(is_sentinel(&unknown));
    assert_eq!(unknown.id, "UNKNOWN");
}
