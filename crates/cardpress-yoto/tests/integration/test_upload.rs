//! Integration tests for the upload and transcode pipeline
//!
//! Verifies the slot/transfer/poll sequence against a mock API,
//! including the dedup skip, per-step failure mapping, and the bounded
//! transcode poll budget.

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cardpress_core::domain::ContentHash;
use cardpress_yoto::poll::{NoopSleeper, PollPolicy};
use cardpress_yoto::upload;
use cardpress_yoto::YotoError;

use crate::common;
use crate::common::RecordingSink;

/// Mounts the slot endpoint handing out a transfer URL on this server
async fn mount_slot_with_transfer(server: &MockServer, upload_id: &str) {
    Mock::given(method("GET"))
        .and(path("/media/transcode/audio/uploadUrl"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "upload": {
                "uploadId": upload_id,
                "uploadUrl": format!("{}/transfer/{}", server.uri(), upload_id)
            }
        })))
        .mount(server)
        .await;
}

/// Mounts the slot endpoint reporting a dedup hit (no transfer URL)
async fn mount_slot_dedup(server: &MockServer, upload_id: &str) {
    Mock::given(method("GET"))
        .and(path("/media/transcode/audio/uploadUrl"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "upload": {"uploadId": upload_id}
        })))
        .mount(server)
        .await;
}

/// Mounts a terminal transcode status for the given upload
async fn mount_transcode_ready(server: &MockServer, upload_id: &str, asset_key: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/media/upload/{upload_id}/transcoded")))
        .and(query_param("loudnorm", "false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "transcode": {
                "transcodedSha256": asset_key,
                "transcodedInfo": {
                    "duration": 184,
                    "fileSize": 2945070,
                    "channels": "stereo",
                    "format": "aac"
                }
            }
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_fresh_upload_runs_all_steps() {
    let server = MockServer::start().await;
    let bytes = b"fake audio bytes".to_vec();
    let hash = ContentHash::of(&bytes);
    let asset_key = "a1b2".repeat(16);

    Mock::given(method("GET"))
        .and(path("/media/transcode/audio/uploadUrl"))
        .and(query_param("sha256", hash.as_str()))
        .and(query_param("filename", "song.mp3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "upload": {
                "uploadId": "upload-001",
                "uploadUrl": format!("{}/transfer/upload-001", server.uri())
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/transfer/upload-001"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    // First status poll reports progress, the second reports the asset.
    Mock::given(method("GET"))
        .and(path("/media/upload/upload-001/transcoded"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "transcode": {"progress": {"phase": "converting", "percent": 50.0}}
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_transcode_ready(&server, "upload-001", &asset_key).await;

    let client = common::api_client(&server);
    let sink = RecordingSink::new();

    let track = upload::upload_track(
        &client,
        PollPolicy::new(0, 5),
        &NoopSleeper,
        "song.mp3",
        bytes,
        &sink,
    )
    .await
    .expect("upload failed");

    assert_eq!(track.asset_key, asset_key);
    assert_eq!(track.duration_secs, Some(184));
    assert_eq!(track.file_size, Some(2945070));
    assert_eq!(track.channels.as_deref(), Some("stereo"));
    assert_eq!(track.format.as_deref(), Some("aac"));

    let lines = sink.lines().await;
    assert!(lines.iter().any(|l| l.contains("Transferring")));
    assert!(lines.iter().any(|l| l.contains("converting")));
    assert!(lines.iter().any(|l| l == "Transcoding complete"));
}

#[tokio::test]
async fn test_dedup_hit_skips_transfer() {
    let server = MockServer::start().await;
    mount_slot_dedup(&server, "upload-002").await;
    mount_transcode_ready(&server, "upload-002", &"c3d4".repeat(16)).await;

    // No byte transfer may happen on a dedup hit.
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let client = common::api_client(&server);
    let sink = RecordingSink::new();

    let track = upload::upload_track(
        &client,
        PollPolicy::new(0, 5),
        &NoopSleeper,
        "song.mp3",
        b"previously uploaded bytes".to_vec(),
        &sink,
    )
    .await
    .expect("upload failed");

    assert_eq!(track.asset_key, "c3d4".repeat(16));

    let lines = sink.lines().await;
    assert!(lines.iter().any(|l| l.contains("Already uploaded")));
    assert!(!lines.iter().any(|l| l.contains("Transferring")));
}

#[tokio::test]
async fn test_transfer_failure_is_typed() {
    let server = MockServer::start().await;
    mount_slot_with_transfer(&server, "upload-003").await;

    Mock::given(method("PUT"))
        .and(path("/transfer/upload-003"))
        .respond_with(ResponseTemplate::new(500).set_body_string("disk full"))
        .mount(&server)
        .await;

    let client = common::api_client(&server);
    let err = upload::upload_track(
        &client,
        PollPolicy::new(0, 5),
        &NoopSleeper,
        "song.mp3",
        b"bytes".to_vec(),
        &RecordingSink::new(),
    )
    .await
    .unwrap_err();

    match err {
        YotoError::TransferFailed { status, message } => {
            assert_eq!(status, 500);
            assert!(message.contains("disk full"));
        }
        other => panic!("expected TransferFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_transcode_timeout_after_poll_budget() {
    let server = MockServer::start().await;
    mount_slot_dedup(&server, "upload-004").await;

    Mock::given(method("GET"))
        .and(path("/media/upload/upload-004/transcoded"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "transcode": {"progress": {"phase": "queued"}}
        })))
        .expect(3)
        .mount(&server)
        .await;

    let client = common::api_client(&server);
    let err = upload::upload_track(
        &client,
        PollPolicy::new(0, 3),
        &NoopSleeper,
        "song.mp3",
        b"bytes".to_vec(),
        &RecordingSink::new(),
    )
    .await
    .unwrap_err();

    match err {
        YotoError::TranscodeTimeout {
            upload_id,
            attempts,
        } => {
            assert_eq!(upload_id.as_str(), "upload-004");
            assert_eq!(attempts, 3);
        }
        other => panic!("expected TranscodeTimeout, got {other:?}"),
    }
}

#[tokio::test]
async fn test_stale_token_is_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/media/transcode/audio/uploadUrl"))
        .respond_with(ResponseTemplate::new(401).set_body_string("jwt expired"))
        .mount(&server)
        .await;

    let client = common::api_client(&server);
    let err = upload::upload_track(
        &client,
        PollPolicy::new(0, 5),
        &NoopSleeper,
        "song.mp3",
        b"bytes".to_vec(),
        &RecordingSink::new(),
    )
    .await
    .unwrap_err();

    match err {
        YotoError::Unauthorized(message) => assert!(message.contains("jwt expired")),
        other => panic!("expected Unauthorized, got {other:?}"),
    }
}
