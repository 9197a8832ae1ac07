//! Upload and transcode pipeline for the Yoto API
//!
//! Pushes one audio file through the platform's three-step intake:
//! request an upload slot keyed by content hash, transfer the bytes to
//! the pre-signed URL, and poll the transcode status until the asset is
//! ready. Content the platform already holds skips the transfer step
//! entirely (the slot response carries no transfer URL).
//!
//! The pipeline is strictly sequential per file; the caller decides how
//! files relate to each other.

use reqwest::Method;
use serde::Deserialize;
use tracing::debug;

use cardpress_core::domain::{ContentHash, UploadId, UploadedTrack};
use cardpress_core::ports::card_platform::IProgressSink;

use crate::client::{ensure_success, YotoClient};
use crate::poll::{PollPolicy, Sleeper};
use crate::YotoError;

// ============================================================================
// Yoto API response types
// ============================================================================

/// Response from the upload-slot endpoint
#[derive(Debug, Deserialize)]
struct UploadSlotResponse {
    upload: UploadSlot,
}

/// One upload slot
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadSlot {
    /// Handle used to poll the transcode status; the newtype rejects
    /// an empty id at deserialization
    upload_id: UploadId,
    /// Pre-signed transfer URL; absent when the platform already holds
    /// content with this hash
    #[serde(default)]
    upload_url: Option<String>,
}

/// Response from the transcode status endpoint
#[derive(Debug, Deserialize)]
struct TranscodeStatusResponse {
    transcode: TranscodeStatus,
}

/// Transcode state for one upload
///
/// Non-terminal responses carry `progress`; terminal responses carry
/// `transcoded_sha256` (and usually `transcoded_info`).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranscodeStatus {
    #[serde(default)]
    transcoded_sha256: Option<String>,
    #[serde(default)]
    transcoded_info: Option<TranscodedInfo>,
    #[serde(default)]
    progress: Option<TranscodeProgress>,
}

/// Media details reported for a finished transcode
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranscodedInfo {
    #[serde(default)]
    duration: Option<u32>,
    #[serde(default)]
    file_size: Option<u64>,
    #[serde(default)]
    channels: Option<String>,
    #[serde(default)]
    format: Option<String>,
}

/// In-flight transcode progress report
#[derive(Debug, Deserialize)]
struct TranscodeProgress {
    #[serde(default)]
    phase: Option<String>,
    #[serde(default)]
    percent: Option<f64>,
}

/// Terminal transcode result
#[derive(Debug)]
struct TranscodeReady {
    asset_key: String,
    info: Option<TranscodedInfo>,
}

// ============================================================================
// Pipeline
// ============================================================================

/// Runs the full upload pipeline for one audio file
///
/// 1. Hash the bytes and request an upload slot keyed by the hash
/// 2. Transfer the bytes to the pre-signed URL, unless the platform
///    reports a dedup hit (no transfer URL in the slot)
/// 3. Poll the transcode status on `policy` until the asset is ready
///
/// Every step reports a human-readable line through `progress`.
///
/// # Errors
/// A failure at any step aborts this file's pipeline with a typed
/// [`YotoError`]; nothing uploaded so far is rolled back (a re-run
/// dedups by hash).
pub async fn upload_track(
    client: &YotoClient,
    policy: PollPolicy,
    sleeper: &dyn Sleeper,
    filename: &str,
    bytes: Vec<u8>,
    progress: &dyn IProgressSink,
) -> Result<UploadedTrack, YotoError> {
    let hash = ContentHash::of(&bytes);
    debug!(
        "Uploading {} ({} bytes, sha256 {})",
        filename,
        bytes.len(),
        hash
    );

    // Step 1: upload slot
    progress
        .log(&format!("Requesting upload slot for {filename}"))
        .await;
    let slot = request_upload_slot(client, &hash, filename).await?;

    // Step 2: byte transfer, skipped on a dedup hit
    match &slot.upload_url {
        Some(url) => {
            progress
                .log(&format!("Transferring {} bytes", bytes.len()))
                .await;
            transfer_bytes(client, url, bytes).await?;
            progress.log("Transfer complete").await;
        }
        None => {
            debug!("Dedup hit for {}, skipping transfer", hash);
            progress.log("Already uploaded, skipping transfer").await;
        }
    }

    // Step 3: transcode poll
    progress.log("Waiting for transcoding").await;
    let ready = poll_transcode(client, policy, sleeper, &slot.upload_id, progress).await?;
    progress.log("Transcoding complete").await;

    let info = ready.info.unwrap_or_default();
    Ok(UploadedTrack {
        asset_key: ready.asset_key,
        duration_secs: info.duration,
        file_size: info.file_size,
        channels: info.channels,
        format: info.format,
    })
}

/// Requests an upload slot for content with the given hash
async fn request_upload_slot(
    client: &YotoClient,
    hash: &ContentHash,
    filename: &str,
) -> Result<UploadSlot, YotoError> {
    let response = client
        .request(Method::GET, "/media/transcode/audio/uploadUrl")
        .query(&[("sha256", hash.as_str()), ("filename", filename)])
        .send()
        .await?;
    let response = ensure_success(response).await?;

    let slot: UploadSlotResponse = response
        .json()
        .await
        .map_err(|e| YotoError::InvalidResponse(e.to_string()))?;

    debug!("Upload slot {} issued", slot.upload.upload_id);
    Ok(slot.upload)
}

/// Transfers the raw bytes to the pre-signed upload URL
///
/// The URL is absolute and pre-authorized; the request must not carry
/// the bearer header.
async fn transfer_bytes(
    client: &YotoClient,
    upload_url: &str,
    bytes: Vec<u8>,
) -> Result<(), YotoError> {
    let response = client
        .http_client()
        .put(upload_url)
        .header("Content-Type", "application/octet-stream")
        .body(bytes)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "unable to read error body".to_string());
        return Err(YotoError::TransferFailed {
            status: status.as_u16(),
            message,
        });
    }
    Ok(())
}

/// Polls the transcode status until a terminal response or the policy
/// budget is exhausted
async fn poll_transcode(
    client: &YotoClient,
    policy: PollPolicy,
    sleeper: &dyn Sleeper,
    upload_id: &UploadId,
    progress: &dyn IProgressSink,
) -> Result<TranscodeReady, YotoError> {
    let path = format!("/media/upload/{upload_id}/transcoded");

    for attempt in 1..=policy.max_attempts {
        sleeper.sleep(policy.interval).await;

        let response = client
            .request(Method::GET, &path)
            .query(&[("loudnorm", "false")])
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let status: TranscodeStatusResponse = response
            .json()
            .await
            .map_err(|e| YotoError::InvalidResponse(e.to_string()))?;

        if let Some(asset_key) = status.transcode.transcoded_sha256 {
            debug!("Transcode of {} ready after {} polls", upload_id, attempt);
            return Ok(TranscodeReady {
                asset_key,
                info: status.transcode.transcoded_info,
            });
        }

        if let Some(report) = &status.transcode.progress {
            progress.log(&format_progress(report)).await;
        }
    }

    Err(YotoError::TranscodeTimeout {
        upload_id: upload_id.clone(),
        attempts: policy.max_attempts,
    })
}

/// Formats a non-terminal transcode progress report as a log line
fn format_progress(progress: &TranscodeProgress) -> String {
    match (&progress.phase, progress.percent) {
        (Some(phase), Some(percent)) => format!("Transcoding: {phase} {percent:.0}%"),
        (Some(phase), None) => format!("Transcoding: {phase}"),
        _ => "Transcoding in progress".to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================
