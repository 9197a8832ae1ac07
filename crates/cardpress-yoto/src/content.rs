//! Card content payloads and submission
//!
//! Maps a [`PublishManifest`] onto the Yoto card content shape (one
//! chapter per track, chapter keys zero-padded to keep player ordering
//! stable) and submits it to the content endpoint. A manifest carrying
//! a card id updates that card in place; otherwise the platform mints a
//! new card and returns its id.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::info;

use cardpress_core::domain::{CardId, ManifestTrack, PublishManifest};

use crate::client::{ensure_success, YotoClient};
use crate::YotoError;

// ============================================================================
// Card content request types
// ============================================================================

/// Card payload for `POST /content`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CardRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    card_id: Option<String>,
    title: String,
    content: CardContent,
    metadata: CardMetadata,
}

#[derive(Debug, Serialize)]
struct CardContent {
    chapters: Vec<Chapter>,
}

/// One chapter of the card; carries exactly one track
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Chapter {
    key: String,
    title: String,
    /// Number shown on the player display while the chapter plays
    overlay_label: String,
    tracks: Vec<ChapterTrack>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChapterTrack {
    key: String,
    title: String,
    /// Asset reference in the platform's `yoto:#<hash>` scheme
    track_url: String,
    r#type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_size: Option<u64>,
}

#[derive(Debug, Serialize)]
struct CardMetadata {
    media: MediaSummary,
}

/// Whole-card media totals shown in the Yoto app
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MediaSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    duration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_size: Option<u64>,
}

// ============================================================================
// Card content response types
// ============================================================================

/// Response from `POST /content`
///
/// The card id arrives either at the top level or nested under `card`,
/// depending on the endpoint revision; both are accepted.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CardResponse {
    #[serde(default)]
    card_id: Option<String>,
    #[serde(default)]
    card: Option<CardEnvelope>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CardEnvelope {
    #[serde(default)]
    card_id: Option<String>,
}

// ============================================================================
// Submission
// ============================================================================

/// Submits the card manifest, creating or updating the card
///
/// # Errors
/// Rejected submissions surface as [`YotoError::Api`] (or
/// [`YotoError::Unauthorized`] on stale credentials) with the platform
/// body verbatim; a response without a card id is
/// [`YotoError::InvalidResponse`].
pub async fn submit_card(
    client: &YotoClient,
    manifest: &PublishManifest,
) -> Result<CardId, YotoError> {
    let request = card_request_from(manifest);
    let action = if request.card_id.is_some() {
        "Updating"
    } else {
        "Creating"
    };
    info!(
        "{} card \"{}\" with {} chapters",
        action,
        manifest.title(),
        manifest.tracks().len()
    );

    let response = client
        .request(Method::POST, "/content")
        .json(&request)
        .send()
        .await?;
    let response = ensure_success(response).await?;

    let card: CardResponse = response
        .json()
        .await
        .map_err(|e| YotoError::InvalidResponse(e.to_string()))?;

    let card_id = card
        .card_id
        .or(card.card.and_then(|c| c.card_id))
        .ok_or_else(|| {
            YotoError::InvalidResponse("content response carried no cardId".to_string())
        })?;

    info!("Card {} accepted", card_id);
    CardId::new(card_id).map_err(|e| YotoError::InvalidResponse(e.to_string()))
}

/// Builds the card payload from a publish manifest
///
/// Chapter keys are the zero-padded original track numbers, so a
/// manifest with gaps (failed tracks excluded) keeps the surviving
/// numbering on the card.
fn card_request_from(manifest: &PublishManifest) -> CardRequest {
    let chapters: Vec<Chapter> = manifest.tracks().iter().map(chapter_from).collect();

    CardRequest {
        card_id: manifest.card_id().map(|id| id.as_str().to_string()),
        title: manifest.title().to_string(),
        content: CardContent { chapters },
        metadata: CardMetadata {
            media: MediaSummary {
                duration: total_duration(manifest.tracks()),
                file_size: total_file_size(manifest.tracks()),
            },
        },
    }
}

fn chapter_from(track: &ManifestTrack) -> Chapter {
    let key = format!("{:02}", track.track_number);
    Chapter {
        key: key.clone(),
        title: track.title.clone(),
        overlay_label: track.track_number.to_string(),
        tracks: vec![ChapterTrack {
            key,
            title: track.title.clone(),
            track_url: format!("yoto:#{}", track.asset_key),
            r#type: "audio".to_string(),
            format: track.format.clone(),
            duration: track.duration_secs,
            file_size: track.file_size,
        }],
    }
}

/// Sums the known track durations; `None` when no track reports one
fn total_duration(tracks: &[ManifestTrack]) -> Option<u32> {
    let known: Vec<u32> = tracks.iter().filter_map(|t| t.duration_secs).collect();
    if known.is_empty() {
        None
    } else {
        Some(known.iter().sum())
    }
}

/// Sums the known track file sizes; `None` when no track reports one
fn total_file_size(tracks: &[ManifestTrack]) -> Option<u64> {
    let known: Vec<u64> = tracks.iter().filter_map(|t| t.file_size).collect();
    if known.is_empty() {
        None
    } else {
        Some(known.iter().sum())
    }
}

// ============================================================================
// Tests
// ============================================================================
