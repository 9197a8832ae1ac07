//! Integration tests for card content submission
//!
//! Verifies the submitted payload shape (create vs update, preserved
//! numbering) and the card-id extraction from both response layouts.

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cardpress_core::domain::{CardId, ManifestTrack, PublishManifest};
use cardpress_yoto::content;
use cardpress_yoto::YotoError;

use crate::common;

fn manifest_with_gap() -> PublishManifest {
    // Track 2 failed upstream; the survivors keep numbers 1 and 3.
    let tracks = vec![
        ManifestTrack {
            title: "Opening".to_string(),
            track_number: 1,
            asset_key: "a".repeat(64),
            duration_secs: Some(120),
            file_size: Some(1_000_000),
            format: Some("aac".to_string()),
        },
        ManifestTrack {
            title: "Closing".to_string(),
            track_number: 3,
            asset_key: "b".repeat(64),
            duration_secs: Some(90),
            file_size: Some(800_000),
            format: Some("aac".to_string()),
        },
    ];
    PublishManifest::new("Bedtime Stories".to_string(), tracks).unwrap()
}

#[tokio::test]
async fn test_create_card_returns_new_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/content"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "cardId": "card-new-1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = common::api_client(&server);
    let card_id = content::submit_card(&client, &manifest_with_gap())
        .await
        .expect("submit failed");
    assert_eq!(card_id.as_str(), "card-new-1");

    // The payload carries no cardId and keeps the numbering gap.
    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(body.get("cardId").is_none());
    assert_eq!(body["title"], "Bedtime Stories");
    assert_eq!(body["content"]["chapters"][0]["key"], "01");
    assert_eq!(body["content"]["chapters"][1]["key"], "03");
    assert_eq!(body["metadata"]["media"]["duration"], 210);
}

#[tokio::test]
async fn test_update_card_submits_stored_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/content"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "cardId": "card-42"
        })))
        .mount(&server)
        .await;

    let manifest = manifest_with_gap().with_card_id(CardId::new("card-42".to_string()).unwrap());
    let client = common::api_client(&server);
    let card_id = content::submit_card(&client, &manifest).await.unwrap();
    assert_eq!(card_id.as_str(), "card-42");

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["cardId"], "card-42");
}

#[tokio::test]
async fn test_nested_card_envelope_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/content"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "card": {"cardId": "card-77"}
        })))
        .mount(&server)
        .await;

    let client = common::api_client(&server);
    let card_id = content::submit_card(&client, &manifest_with_gap())
        .await
        .unwrap();
    assert_eq!(card_id.as_str(), "card-77");
}

#[tokio::test]
async fn test_response_without_card_id_is_invalid() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/content"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;

    let client = common::api_client(&server);
    let err = content::submit_card(&client, &manifest_with_gap())
        .await
        .unwrap_err();
    assert!(matches!(err, YotoError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_submit_rejection_is_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/content"))
        .respond_with(ResponseTemplate::new(400).set_body_string("chapter limit exceeded"))
        .mount(&server)
        .await;

    let client = common::api_client(&server);
    let err = content::submit_card(&client, &manifest_with_gap())
        .await
        .unwrap_err();

    match err {
        YotoError::Api { status, message } => {
            assert_eq!(status, 400);
            assert!(message.contains("chapter limit exceeded"));
        }
        other => panic!("expected Api, got {other:?}"),
    }
}
