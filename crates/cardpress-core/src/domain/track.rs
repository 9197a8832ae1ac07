//! Track, playlist and manifest types for publishing
//!
//! `TrackRecord` and `PlaylistRecord` are the shapes the track source
//! port hands to the publish engine. `UploadedTrack` describes one
//! transcoded asset coming back from the platform adapter, and
//! `PublishManifest` is the card payload assembled from the successful
//! uploads of a run.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{CardId, PlaylistId};

/// A single track as stored in the local playlist library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRecord {
    /// Display title of the track
    pub title: String,
    /// Path of the audio file on the local machine
    pub local_path: PathBuf,
    /// Duration in seconds when the library knows it
    pub duration_secs: Option<u32>,
}

/// An ordered playlist as returned by the track source port
///
/// The `tracks` order is the persisted playlist order and is the order
/// the publish engine uploads in and numbers the manifest by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistRecord {
    pub id: PlaylistId,
    pub name: String,
    /// Card identifier from a previous publish, if any
    pub card_id: Option<CardId>,
    pub tracks: Vec<TrackRecord>,
}

/// Descriptor of one transcoded asset returned by the upload pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedTrack {
    /// Platform key referencing the transcoded audio
    pub asset_key: String,
    /// Duration reported by the transcoder
    pub duration_secs: Option<u32>,
    /// Size in bytes reported by the transcoder
    pub file_size: Option<u64>,
    /// Channel layout reported by the transcoder (e.g. "stereo")
    pub channels: Option<String>,
    /// Audio container format reported by the transcoder (e.g. "aac")
    pub format: Option<String>,
}

/// One entry of a card manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestTrack {
    pub title: String,
    /// 1-based position in the original playlist. Preserved even when
    /// earlier tracks failed to upload, so numbering never shifts.
    pub track_number: u32,
    pub asset_key: String,
    pub duration_secs: Option<u32>,
    pub file_size: Option<u64>,
    pub format: Option<String>,
}

/// The card payload submitted to the platform content endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishManifest {
    card_id: Option<CardId>,
    title: String,
    tracks: Vec<ManifestTrack>,
}

impl PublishManifest {
    /// Create a manifest from the tracks that uploaded successfully
    ///
    /// # Errors
    /// Returns `DomainError::ValidationFailed` if the title is empty or
    /// no tracks are given. An empty manifest is never submitted.
    pub fn new(title: String, tracks: Vec<ManifestTrack>) -> Result<Self, DomainError> {
        if title.trim().is_empty() {
            return Err(DomainError::ValidationFailed(
                "manifest title cannot be empty".to_string(),
            ));
        }
        if tracks.is_empty() {
            return Err(DomainError::ValidationFailed(
                "manifest must contain at least one track".to_string(),
            ));
        }

        Ok(Self {
            card_id: None,
            title,
            tracks,
        })
    }

    /// Attach the card identifier from a previous publish (update semantics)
    #[must_use]
    pub fn with_card_id(mut self, card_id: CardId) -> Self {
        self.card_id = Some(card_id);
        self
    }

    /// Card identifier to update, `None` for a first publish
    #[must_use]
    pub fn card_id(&self) -> Option<&CardId> {
        self.card_id.as_ref()
    }

    /// Card title
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Manifest entries in playlist order
    #[must_use]
    pub fn tracks(&self) -> &[ManifestTrack] {
        &self.tracks
    }
}
