//! Publish command - upload a playlist and submit it as a MYO card
//!
//! Wires the publish engine to the Yoto adapter and the file-backed
//! library, then renders the engine's event stream. With `--json` each
//! event is printed as one JSON line; the human rendering shows one
//! status line per track.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::debug;

use cardpress_core::domain::ProgressEvent;
use cardpress_publish::PublishEngine;
use cardpress_yoto::client::YotoClient;
use cardpress_yoto::poll::PollPolicy;
use cardpress_yoto::provider::YotoProvider;

use crate::commands::auth::{credential_cache, device_auth};
use crate::library::FileLibrary;
use crate::output::get_formatter;
use crate::CliContext;

#[derive(Debug, Args)]
pub struct PublishCommand {
    /// Playlist name or id
    playlist: String,
}

impl PublishCommand {
    /// Execute the publish:
    /// 1. Resolve the playlist in the library
    /// 2. Build the platform adapter with the stored access token
    /// 3. Start the engine run and render its event stream
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let fmt = get_formatter(ctx.format);

        // Step 1: Resolve the playlist reference
        let library = Arc::new(FileLibrary::new(ctx.library_dir.clone()));
        let Some(playlist) = library.resolve(&self.playlist).await? else {
            fmt.error(&format!(
                "Playlist '{}' not found in {}",
                self.playlist,
                library.dir().display()
            ));
            bail!("Playlist not found");
        };

        // Step 2: Build the platform adapter. The stored access token
        // seeds the client; a stale one is refreshed by the engine.
        let cache = credential_cache();
        let credentials = cache
            .get()
            .await?
            .context("Not authenticated. Run `cardpress login` first.")?;

        let client = YotoClient::with_base_url(
            credentials.access_token(),
            ctx.config.api.api_base_url.clone(),
        );
        let policy = PollPolicy::new(
            ctx.config.publish.transcode_poll_interval,
            ctx.config.publish.transcode_poll_attempts,
        );
        let platform = Arc::new(YotoProvider::new(client).with_poll_policy(policy));
        let auth = Arc::new(device_auth(ctx, None));

        let engine = PublishEngine::new(platform, library.clone(), library, cache)
            .with_auth(auth);

        // Step 3: Run and render
        let mut events = engine.publish(playlist.id).await?;

        let mut failed: Option<String> = None;
        while let Some(event) = events.recv().await {
            if ctx.format.is_json() {
                fmt.event_line(&event);
                if let ProgressEvent::RunFailed { error } = event {
                    failed = Some(error);
                }
                continue;
            }

            match event {
                ProgressEvent::TrackStarted {
                    current,
                    total,
                    title,
                } => fmt.info(&format!("[{current}/{total}] Uploading {title}...")),
                ProgressEvent::TrackLog { message, .. } => debug!("{message}"),
                ProgressEvent::TrackCompleted {
                    current,
                    total,
                    title,
                } => fmt.success(&format!("[{current}/{total}] {title}")),
                ProgressEvent::TrackFailed {
                    current,
                    total,
                    title,
                    error,
                } => fmt.warn(&format!("[{current}/{total}] {title}: {error}")),
                ProgressEvent::RunCompleted {
                    uploaded_tracks,
                    card_id,
                    errors,
                } => {
                    fmt.success(&format!(
                        "Published '{}' as card {card_id} ({uploaded_tracks} tracks)",
                        playlist.name
                    ));
                    for failure in &errors {
                        fmt.warn(&format!(
                            "Track {} '{}' was skipped: {}",
                            failure.track_number, failure.title, failure.error
                        ));
                    }
                }
                ProgressEvent::RunFailed { error } => {
                    fmt.error(&error);
                    failed = Some(error);
                }
            }
        }

        if let Some(error) = failed {
            bail!("Publish failed: {error}");
        }
        Ok(())
    }
}
