//! YotoProvider - ICardPlatform implementation for the Yoto API
//!
//! Wraps the [`YotoClient`] and delegates to the upload and content
//! modules to fulfil the [`ICardPlatform`] port contract.
//!
//! ## Design Notes
//!
//! - Uses `tokio::sync::Mutex` because `ICardPlatform` methods take
//!   `&self` while `YotoClient::set_access_token` requires `&mut self`
//!   (applied after a mid-run token refresh).
//! - The transcode poll policy and sleeper are injectable so tests can
//!   drive the poll loop without real delays.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Mutex;
use tracing::debug;

use cardpress_core::domain::{CardId, PublishManifest, UploadedTrack};
use cardpress_core::ports::card_platform::{ICardPlatform, IProgressSink};

use crate::client::YotoClient;
use crate::poll::{PollPolicy, Sleeper, TokioSleeper};
use crate::{content, upload};

/// Card platform implementation backed by the Yoto API
pub struct YotoProvider {
    /// The underlying API client, protected by a mutex
    client: Mutex<YotoClient>,
    /// Poll policy for transcode status checks
    policy: PollPolicy,
    /// Wait implementation between transcode polls
    sleeper: Arc<dyn Sleeper>,
}

impl YotoProvider {
    /// Creates a provider wrapping the given [`YotoClient`]
    pub fn new(client: YotoClient) -> Self {
        Self {
            client: Mutex::new(client),
            policy: PollPolicy::transcode(),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Overrides the transcode poll policy
    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Overrides the sleeper used between transcode polls
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }
}

#[async_trait::async_trait]
impl ICardPlatform for YotoProvider {
    /// Runs the upload pipeline for one file
    ///
    /// Delegates to [`upload::upload_track`].
    async fn upload_track(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        progress: &dyn IProgressSink,
    ) -> Result<UploadedTrack> {
        let client = self.client.lock().await;
        debug!(filename, size = bytes.len(), "YotoProvider::upload_track");
        Ok(upload::upload_track(
            &client,
            self.policy,
            self.sleeper.as_ref(),
            filename,
            bytes,
            progress,
        )
        .await?)
    }

    /// Submits the card manifest
    ///
    /// Delegates to [`content::submit_card`].
    async fn submit_manifest(&self, manifest: &PublishManifest) -> Result<CardId> {
        let client = self.client.lock().await;
        debug!(title = manifest.title(), "YotoProvider::submit_manifest");
        Ok(content::submit_card(&client, manifest).await?)
    }

    /// Replaces the bearer token (e.g., after a refresh)
    async fn set_access_token(&self, token: &str) {
        self.client.lock().await.set_access_token(token);
    }
}
