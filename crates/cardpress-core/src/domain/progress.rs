//! Progress events for the publish stream
//!
//! One publish run emits a sequence of per-track events followed by
//! exactly one terminal event. The enum serializes to the line-protocol
//! shape consumed by UI frontends: an object tagged with `type`, where
//! per-track failures and the run-level failure both use `"error"` on
//! the wire but stay distinct variants here. Events are outbound only,
//! so the enum implements `Serialize` and nothing parses it back.

use serde::{Deserialize, Serialize};

use super::newtypes::CardId;

/// A single failed track recorded during a publish run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackFailure {
    /// 1-based position of the track in the original playlist
    pub track_number: u32,
    pub title: String,
    pub error: String,
}

/// One event on the publish progress stream
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ProgressEvent {
    /// Upload pipeline started for a track
    #[serde(rename = "start")]
    TrackStarted {
        current: u32,
        total: u32,
        title: String,
    },

    /// Intermediate pipeline step for a track (hashing, transfer, transcode)
    #[serde(rename = "log")]
    TrackLog {
        current: u32,
        total: u32,
        title: String,
        message: String,
    },

    /// A track finished uploading and transcoding
    #[serde(rename = "complete")]
    TrackCompleted {
        current: u32,
        total: u32,
        title: String,
    },

    /// A track failed; the run continues with the next track
    #[serde(rename = "error")]
    TrackFailed {
        current: u32,
        total: u32,
        title: String,
        error: String,
    },

    /// Terminal: the card was submitted and its identifier persisted
    #[serde(rename = "done", rename_all = "camelCase")]
    RunCompleted {
        uploaded_tracks: u32,
        card_id: CardId,
        errors: Vec<TrackFailure>,
    },

    /// Terminal: the run failed as a whole and nothing was submitted
    #[serde(rename = "error")]
    RunFailed { error: String },
}

impl ProgressEvent {
    /// Whether this event closes the stream
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::RunCompleted { .. } | Self::RunFailed { .. })
    }
}
