//! Integration tests for the device-code authentication flow
//!
//! Simulates the Yoto authorization server with wiremock and verifies
//! code issuance, every token-poll outcome, token refresh, and the
//! caller-enforced expiry that must never reach the network.

use std::sync::Arc;

use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cardpress_core::ports::credential_store::MemoryCredentialStore;
use cardpress_core::ports::device_auth::{IDeviceAuth, PollOutcome};
use cardpress_core::usecases::{CredentialCache, DeviceLoginUseCase, PollResult};
use cardpress_yoto::YotoError;

use crate::common;

#[tokio::test]
async fn test_request_code_parses_authorization() {
    let server = MockServer::start().await;
    common::mount_device_code(&server).await;
    let auth = common::device_auth_against(&server);

    let code = auth.request_code().await.expect("request_code failed");

    assert_eq!(code.device_code, "dev-code-001");
    assert_eq!(code.user_code, "WDXB-QWWK");
    assert_eq!(code.verification_uri, "https://login.example/activate");
    assert_eq!(code.expires_in_secs, 300);
    assert_eq!(code.interval_secs, 5);
    assert!(code.verification_uri_complete.is_some());
}

#[tokio::test]
async fn test_request_code_defaults_interval_when_omitted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/device/code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "device_code": "dev-1",
            "user_code": "AAAA-BBBB",
            "verification_uri": "https://login.example/activate",
            "expires_in": 300
        })))
        .mount(&server)
        .await;
    let auth = common::device_auth_against(&server);

    let code = auth.request_code().await.unwrap();
    assert_eq!(code.interval_secs, 5);
}

#[tokio::test]
async fn test_request_code_failure_carries_server_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/device/code"))
        .respond_with(ResponseTemplate::new(403).set_body_string("unknown client"))
        .mount(&server)
        .await;
    let auth = common::device_auth_against(&server);

    let err = auth.request_device_code().await.unwrap_err();
    match err {
        YotoError::AuthRequestFailed { message } => assert!(message.contains("unknown client")),
        other => panic!("expected AuthRequestFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_poll_sends_device_grant_form() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains(
            "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Adevice_code",
        ))
        .and(body_string_contains("device_code=dev-code-001"))
        .and(body_string_contains("client_id=test-client"))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "error": "authorization_pending"
        })))
        .expect(1)
        .mount(&server)
        .await;
    let auth = common::device_auth_against(&server);

    let outcome = auth.poll_token("dev-code-001").await.unwrap();
    assert_eq!(outcome, PollOutcome::Pending);
}

#[tokio::test]
async fn test_poll_slow_down_carries_interval() {
    let server = MockServer::start().await;
    common::mount_token_error(
        &server,
        429,
        serde_json::json!({"error": "slow_down", "interval": 10}),
    )
    .await;
    let auth = common::device_auth_against(&server);

    let outcome = auth.poll_token("dev-code-001").await.unwrap();
    assert_eq!(
        outcome,
        PollOutcome::SlowDown {
            interval_secs: Some(10)
        }
    );
}

#[tokio::test]
async fn test_poll_denied_carries_description() {
    let server = MockServer::start().await;
    common::mount_token_error(
        &server,
        403,
        serde_json::json!({
            "error": "access_denied",
            "error_description": "User did not authorize the request"
        }),
    )
    .await;
    let auth = common::device_auth_against(&server);

    match auth.poll_token("dev-code-001").await.unwrap() {
        PollOutcome::Denied { description } => {
            assert_eq!(description, "User did not authorize the request");
        }
        other => panic!("expected Denied, got {other:?}"),
    }
}

#[tokio::test]
async fn test_poll_expired_token_is_terminal() {
    let server = MockServer::start().await;
    common::mount_token_error(&server, 403, serde_json::json!({"error": "expired_token"})).await;
    let auth = common::device_auth_against(&server);

    let outcome = auth.poll_token("dev-code-001").await.unwrap();
    assert_eq!(outcome, PollOutcome::Expired);
}

#[tokio::test]
async fn test_pending_then_approved() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "error": "authorization_pending"
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": common::fake_jwt(r#"{"sub": "user-55", "exp": 1767225600}"#),
            "refresh_token": "refresh-55",
            "token_type": "Bearer",
            "expires_in": 86400
        })))
        .mount(&server)
        .await;

    let auth = common::device_auth_against(&server);

    assert_eq!(
        auth.poll_token("dev-code-001").await.unwrap(),
        PollOutcome::Pending
    );
    match auth.poll_token("dev-code-001").await.unwrap() {
        PollOutcome::Approved(grant) => {
            assert_eq!(grant.refresh_token, "refresh-55");
            assert_eq!(grant.user_id.as_deref(), Some("user-55"));
            assert!(grant.expires_at.is_some());
        }
        other => panic!("expected Approved, got {other:?}"),
    }
}

#[tokio::test]
async fn test_expired_session_never_polls_token_endpoint() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/device/code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "device_code": "dev-1",
            "user_code": "AAAA-BBBB",
            "verification_uri": "https://login.example/activate",
            "expires_in": 0,
            "interval": 5
        })))
        .mount(&server)
        .await;

    // The token endpoint must never be reached once the code is expired.
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let auth = Arc::new(common::device_auth_against(&server));
    let cache = Arc::new(CredentialCache::new(Arc::new(MemoryCredentialStore::new())));
    let login = DeviceLoginUseCase::new(auth, cache);

    login.start().await.unwrap();
    let result = login.poll_once().await.unwrap();
    assert!(matches!(result, PollResult::Expired));
}

#[tokio::test]
async fn test_refresh_rotates_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=old-refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "new-access",
            "refresh_token": "new-refresh",
            "expires_in": 86400
        })))
        .mount(&server)
        .await;
    let auth = common::device_auth_against(&server);

    let grant = auth.refresh("old-refresh").await.unwrap();
    assert_eq!(grant.access_token, "new-access");
    assert_eq!(grant.refresh_token, "new-refresh");
}

#[tokio::test]
async fn test_refresh_keeps_old_token_when_not_rotated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "new-access",
            "expires_in": 86400
        })))
        .mount(&server)
        .await;
    let auth = common::device_auth_against(&server);

    let grant = auth.refresh("old-refresh").await.unwrap();
    assert_eq!(grant.refresh_token, "old-refresh");
}

#[tokio::test]
async fn test_refresh_rejection_is_unauthorized() {
    let server = MockServer::start().await;
    common::mount_token_error(&server, 403, serde_json::json!({"error": "invalid_grant"})).await;
    let auth = common::device_auth_against(&server);

    let err = auth.refresh("stale-refresh").await.unwrap_err();
    assert!(matches!(err, YotoError::Unauthorized(_)));
}
