//! Cardpress Publish - the upload-and-submit orchestration engine
//!
//! This crate drives one publish run end to end: fail-fast precondition
//! checks, the sequential per-track upload loop, manifest assembly from
//! the uploads that succeeded, card submission, and card-id persistence.
//! Progress is streamed to the caller through a bounded one-shot channel
//! that carries exactly one terminal event.
//!
//! The engine depends only on the port traits from `cardpress-core`;
//! the Yoto adapter (or any other platform adapter) is wired in by the
//! composition root.

pub mod engine;
pub mod manifest;
pub mod progress;

use std::path::PathBuf;

use thiserror::Error;

use cardpress_core::domain::{PlaylistId, TrackFailure};

pub use engine::{PublishEngine, PublishSummary};
pub use progress::ProgressChannel;

/// Errors raised by the publish engine
///
/// The first five variants are fail-fast precondition failures returned
/// before the progress stream exists. The remaining ones describe a run
/// that started and could not complete.
#[derive(Debug, Error)]
pub enum PublishError {
    /// No credentials are stored; nothing touches the network
    #[error("Not authenticated; run the device login first")]
    NotAuthenticated,

    /// A publish run for this playlist is already in flight
    #[error("A publish for playlist {0} is already running")]
    PublishInProgress(PlaylistId),

    /// The track source knows no playlist with this id
    #[error("Playlist {0} not found")]
    PlaylistNotFound(PlaylistId),

    /// The playlist has no tracks; an empty card is never submitted
    #[error("Playlist '{0}' has no tracks")]
    EmptyPlaylist(String),

    /// A track's audio file is missing from the local library
    #[error("Missing local file for '{title}': {}", path.display())]
    MissingLocalAsset {
        /// Title of the track whose file is absent
        title: String,
        /// The path that failed the existence check
        path: PathBuf,
    },

    /// Every track failed to upload; the content endpoint was not called
    #[error("All {} track uploads failed", errors.len())]
    AllTracksFailed {
        /// One entry per failed track, in playlist order
        errors: Vec<TrackFailure>,
    },

    /// The platform rejected the assembled manifest
    #[error("Card submission rejected: {message}")]
    ManifestSubmitFailed {
        /// The platform's own description, verbatim
        message: String,
    },

    /// A port call failed for an infrastructure reason
    #[error(transparent)]
    Provider(#[from] anyhow::Error),
}
