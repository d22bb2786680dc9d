//! Tests for [`JiraParser`].

use super::*;
use crate::webhook::WebhookHeaders;
use serde_json::json;

fn input(body: serde_json::Value) -> WebhookInput {
    WebhookInput::new(WebhookHeaders::new(), body)
}

fn issue_body(webhook_event: &str, issue_event: &str) -> serde_json::Value {
    json!({
        "webhookEvent": webhook_event,
        "issue_event_type_name": issue_event,
        "issue": {
            "id": "10042",
            "key": "OPS-12",
            "fields": {
                "summary": "Login outage",
                "created": "2022-03-28T18:06:28.000+0200",
                "updated": "2022-03-28T19:06:28.000+0200",
                "resolutiondate": null,
                "customfield_10035": "https://bitbucket.org/acme/identity/src/main/",
                "customfield_10036": null
            }
        }
    })
}

#[tokio::test]
async fn test_every_webhook_is_an_incident() {
    let parser = JiraParser::new();
    let result = parser.classify(&input(json!({}))).await.unwrap();
    assert_eq!(result, EventType::Incident);
}

#[tokio::test]
async fn test_created_issue_is_open() {
    let parser = JiraParser::new();
    let payload = parser
        .extract_payload(&input(issue_body("jira:issue_created", "issue_created")))
        .await
        .unwrap();

    assert_eq!(payload.id, "10042");
    assert_eq!(payload.time_created, "1648483588000");
    assert_eq!(payload.time_resolved.as_deref(), Some(""));
    assert_eq!(payload.title.as_deref(), Some("Login outage"));
}

#[tokio::test]
async fn test_resolved_issue_prefers_resolutiondate() {
    let parser = JiraParser::new();
    let mut body = issue_body("jira:issue_updated", "issue_generic");
    body["issue"]["fields"]["resolutiondate"] = json!("2022-03-28T20:06:28.000+0200");

    let payload = parser.extract_payload(&input(body)).await.unwrap();

    assert_eq!(payload.time_resolved.as_deref(), Some("1648490788000"));
}

#[tokio::test]
async fn test_deleted_issue_falls_back_to_updated() {
    let parser = JiraParser::new();
    let payload = parser
        .extract_payload(&input(issue_body("jira:issue_deleted", "")))
        .await
        .unwrap();

    assert_eq!(payload.time_resolved.as_deref(), Some("1648487188000"));
}

#[tokio::test]
async fn test_generic_update_without_resolution_is_unknown() {
    let parser = JiraParser::new();
    let payload = parser
        .extract_payload(&input(issue_body("jira:issue_updated", "issue_generic")))
        .await
        .unwrap();

    assert!(payload.is_unknown());
}

#[tokio::test]
async fn test_created_issue_without_created_field_fails() {
    let parser = JiraParser::new();
    let mut body = issue_body("jira:issue_created", "issue_created");
    body["issue"]["fields"]
        .as_object_mut()
        .unwrap()
        .remove("created");

    let result = parser.extract_payload(&input(body)).await;
    assert!(matches!(result, Err(ParserError::MissingEventTime { .. })));
}

// ============================================================================
// extract_repo_name
// ============================================================================

#[tokio::test]
async fn test_repo_name_from_bitbucket_custom_field() {
    let parser = JiraParser::new();
    let body = issue_body("jira:issue_created", "issue_created");
    assert_eq!(
        parser.extract_repo_name(&body).await.unwrap(),
        "acme/identity"
    );
}

#[tokio::test]
async fn test_repo_name_from_github_custom_field() {
    let parser = JiraParser::new();
    let body = json!({
        "issue": { "fields": { "customfield_20000": "https://github.com/acme/web" } }
    });
    assert_eq!(parser.extract_repo_name(&body).await.unwrap(), "acme/web");
}

#[tokio::test]
async fn test_repo_name_without_fields_fails() {
    let parser = JiraParser::new();
    let result = parser
        .extract_repo_name(&json!({ "issue": { "id": "1" } }))
        .await;
    assert!(matches!(result, Err(ParserError::MissingJiraFields)));
}

#[tokio::test]
async fn test_repo_name_without_matching_custom_field_fails() {
    let parser = JiraParser::new();
    let body = json!({
        "issue": { "fields": {
            "summary": "https://github.com/not/a-custom-field",
            "customfield_1": "https://gitlab.com/acme/web"
        } }
    });
    let result = parser.extract_repo_name(&body).await;
    assert!(matches!(
        result,
        Err(ParserError::MissingJiraMatchedCustomFieldKey)
    ));
}
