//! Card platform port
//!
//! Abstracts the remote operations the publish engine needs: pushing one
//! audio file through the upload/transcode pipeline and submitting the
//! assembled card manifest. Pipeline steps report human-readable lines
//! through [`IProgressSink`] so the engine can forward them onto the
//! progress stream without the adapter knowing about events.

use anyhow::Result;

use crate::domain::{CardId, PublishManifest, UploadedTrack};

/// Sink for pipeline step lines emitted during one track upload
#[async_trait::async_trait]
pub trait IProgressSink: Send + Sync {
    /// Report one human-readable pipeline line
    async fn log(&self, message: &str);
}

/// Port for the remote card platform
#[async_trait::async_trait]
pub trait ICardPlatform: Send + Sync {
    /// Upload one audio file and wait for its transcoded asset
    ///
    /// Transfers are skipped when the platform already holds content with
    /// the same hash; the returned descriptor is identical either way.
    ///
    /// # Errors
    /// Returns an error when any pipeline step fails for this file. The
    /// failure is scoped to the file; the caller decides whether to
    /// continue with other tracks.
    async fn upload_track(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        progress: &dyn IProgressSink,
    ) -> Result<UploadedTrack>;

    /// Submit the card manifest, creating or updating the card
    ///
    /// A manifest carrying a card id updates that card; otherwise a new
    /// card is created. Returns the card id reported by the platform.
    ///
    /// # Errors
    /// Returns an error when the submission is rejected; the message
    /// carries the platform's own description.
    async fn submit_manifest(&self, manifest: &PublishManifest) -> Result<CardId>;

    /// Replaces the bearer token used by subsequent calls
    ///
    /// Applied after a token refresh. Platforms without bearer auth
    /// keep the default no-op.
    async fn set_access_token(&self, _token: &str) {}
}
