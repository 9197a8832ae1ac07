//! Publish engine
//!
//! The [`PublishEngine`] drives one playlist through the full publish
//! pipeline against the card platform port:
//!
//! 1. **Preconditions** (no network): credentials present, no run
//!    already in flight for this playlist, playlist exists and has
//!    tracks, every audio file present locally.
//! 2. **Uploads**: one track at a time in playlist order; a failed
//!    track is recorded and the loop continues.
//! 3. **Manifest**: assembled from the successful uploads only, track
//!    numbers frozen at their original positions.
//! 4. **Submit**: create-or-update against the platform; the returned
//!    card id is persisted when it differs from the stored one.
//!
//! Uploads are strictly sequential: the platform rate-limits, and the
//! event stream's ordering guarantee depends on one track in flight at
//! a time. Every step reports through the run's [`ProgressChannel`];
//! the stream ends with exactly one terminal event.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use cardpress_core::domain::{
    CardId, Credentials, PlaylistId, PlaylistRecord, ProgressEvent, TrackFailure, TrackRecord,
    UploadedTrack,
};
use cardpress_core::ports::{ICardPlatform, IDeviceAuth, ILocalLibrary, IProgressSink, ITrackSource};
use cardpress_core::usecases::CredentialCache;

use crate::manifest;
use crate::progress::ProgressChannel;
use crate::PublishError;

/// Refresh the access token when it expires within this margin
const REFRESH_MARGIN_SECS: i64 = 60;

/// Terminal outcome of a successful publish run
#[derive(Debug, Clone, PartialEq)]
pub struct PublishSummary {
    /// Number of tracks uploaded and included in the card
    pub uploaded_tracks: u32,
    /// Identifier of the created or updated card
    pub card_id: CardId,
    /// Per-track failures tolerated during the run
    pub errors: Vec<TrackFailure>,
}

/// Orchestrates publish runs over the platform, track source, library
/// and credential ports
///
/// Cloning is cheap; clones share the per-playlist run-lock set, so
/// overlapping runs for the same playlist are rejected across clones.
#[derive(Clone)]
pub struct PublishEngine {
    platform: Arc<dyn ICardPlatform + Send + Sync>,
    tracks: Arc<dyn ITrackSource + Send + Sync>,
    library: Arc<dyn ILocalLibrary + Send + Sync>,
    credentials: Arc<CredentialCache>,
    auth: Option<Arc<dyn IDeviceAuth + Send + Sync>>,
    in_flight: Arc<Mutex<HashSet<PlaylistId>>>,
}

impl PublishEngine {
    /// Creates an engine over the given ports
    pub fn new(
        platform: Arc<dyn ICardPlatform + Send + Sync>,
        tracks: Arc<dyn ITrackSource + Send + Sync>,
        library: Arc<dyn ILocalLibrary + Send + Sync>,
        credentials: Arc<CredentialCache>,
    ) -> Self {
        Self {
            platform,
            tracks,
            library,
            credentials,
            auth: None,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Enables pre-run token refresh through the given auth port
    ///
    /// Without it the engine uses the stored access token as-is.
    #[must_use]
    pub fn with_auth(mut self, auth: Arc<dyn IDeviceAuth + Send + Sync>) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Starts a publish run and returns its event stream
    ///
    /// All precondition checks run before the stream exists and before
    /// any upload traffic. On success the run continues on a spawned
    /// task; the receiver yields per-track events followed by exactly
    /// one terminal event, after which the stream closes. Dropping the
    /// receiver does not abort the run.
    ///
    /// # Errors
    /// Returns a [`PublishError`] precondition failure without emitting
    /// any event.
    pub async fn publish(
        &self,
        playlist_id: PlaylistId,
    ) -> Result<mpsc::Receiver<ProgressEvent>, PublishError> {
        // Step 1: Fail-fast checks, cheapest first. Nothing in this
        // block touches the network.
        if !self.credentials.is_authenticated().await? {
            return Err(PublishError::NotAuthenticated);
        }

        let playlist = self
            .tracks
            .playlist(&playlist_id)
            .await?
            .ok_or(PublishError::PlaylistNotFound(playlist_id))?;

        if playlist.tracks.is_empty() {
            return Err(PublishError::EmptyPlaylist(playlist.name));
        }

        for track in &playlist.tracks {
            if !self.library.exists(&track.local_path).await? {
                return Err(PublishError::MissingLocalAsset {
                    title: track.title.clone(),
                    path: track.local_path.clone(),
                });
            }
        }

        // Step 2: Claim the per-playlist run lock. Held by the spawned
        // task until the run finishes, however it finishes.
        let guard = RunGuard::acquire(Arc::clone(&self.in_flight), playlist_id)?;

        // Step 3: Refresh a near-expiry token before the first upload.
        self.ensure_fresh().await?;

        info!(
            playlist = %playlist_id,
            name = %playlist.name,
            tracks = playlist.tracks.len(),
            "Starting publish run"
        );

        let (channel, receiver) = ProgressChannel::new();
        let engine = self.clone();
        tokio::spawn(async move {
            let _guard = guard;
            engine.run(playlist, channel).await;
        });

        Ok(receiver)
    }

    /// Publishes and waits for the terminal outcome
    ///
    /// The one-shot form for callers without a live status display:
    /// drains the event stream, discards the intermediate events, and
    /// returns the terminal result.
    ///
    /// # Errors
    /// Returns the precondition failure or the run's terminal error.
    pub async fn publish_and_wait(&self, playlist_id: PlaylistId) -> Result<PublishSummary> {
        let mut events = self.publish(playlist_id).await?;

        while let Some(event) = events.recv().await {
            match event {
                ProgressEvent::RunCompleted {
                    uploaded_tracks,
                    card_id,
                    errors,
                } => {
                    return Ok(PublishSummary {
                        uploaded_tracks,
                        card_id,
                        errors,
                    })
                }
                ProgressEvent::RunFailed { error } => anyhow::bail!(error),
                _ => {}
            }
        }

        anyhow::bail!("Publish stream closed without a terminal event")
    }

    /// Executes one run and emits its terminal event
    #[tracing::instrument(skip_all, fields(playlist = %playlist.id, name = %playlist.name))]
    async fn run(&self, playlist: PlaylistRecord, channel: ProgressChannel) {
        match self.run_inner(&playlist, &channel).await {
            Ok(summary) => {
                info!(
                    uploaded = summary.uploaded_tracks,
                    failed = summary.errors.len(),
                    card_id = %summary.card_id,
                    "Publish run completed"
                );
                channel
                    .finish(ProgressEvent::RunCompleted {
                        uploaded_tracks: summary.uploaded_tracks,
                        card_id: summary.card_id,
                        errors: summary.errors,
                    })
                    .await;
            }
            Err(err) => {
                error!(error = %err, "Publish run failed");
                channel
                    .finish(ProgressEvent::RunFailed {
                        error: err.to_string(),
                    })
                    .await;
            }
        }
    }

    /// The run body: upload loop, manifest, submit, card-id persistence
    async fn run_inner(
        &self,
        playlist: &PlaylistRecord,
        channel: &ProgressChannel,
    ) -> Result<PublishSummary, PublishError> {
        let total = playlist.tracks.len() as u32;
        let mut uploads: Vec<(usize, UploadedTrack)> = Vec::new();
        let mut errors: Vec<TrackFailure> = Vec::new();

        // Step 1: Upload each track in playlist order. A failure is
        // scoped to its track; the loop always reaches the end.
        for (index, track) in playlist.tracks.iter().enumerate() {
            let current = index as u32 + 1;
            channel.track_started(current, total, &track.title).await;

            match self.upload_one(track, current, total, channel).await {
                Ok(uploaded) => {
                    channel.track_completed(current, total, &track.title).await;
                    uploads.push((index, uploaded));
                }
                Err(err) => {
                    let message = format!("{err:#}");
                    warn!(track = %track.title, error = %message, "Track upload failed, continuing");
                    channel
                        .track_failed(current, total, &track.title, &message)
                        .await;
                    errors.push(TrackFailure {
                        track_number: current,
                        title: track.title.clone(),
                        error: message,
                    });
                }
            }
        }

        // Step 2: Never submit an empty card.
        if uploads.is_empty() {
            return Err(PublishError::AllTracksFailed { errors });
        }

        // Step 3: Assemble and submit. A rejected manifest fails the
        // run; the uploaded assets stay on the platform and a re-run
        // dedups them by hash.
        let manifest =
            manifest::assemble(playlist, &uploads).map_err(|e| PublishError::Provider(e.into()))?;
        let card_id = self
            .platform
            .submit_manifest(&manifest)
            .await
            .map_err(|e| PublishError::ManifestSubmitFailed {
                message: format!("{e:#}"),
            })?;

        // Step 4: Persist the card id only when it changed (first
        // publish, or the platform re-issued one).
        if playlist.card_id.as_ref() != Some(&card_id) {
            self.tracks.set_card_id(&playlist.id, &card_id).await?;
            info!(card_id = %card_id, "Card id persisted for playlist");
        }

        Ok(PublishSummary {
            uploaded_tracks: uploads.len() as u32,
            card_id,
            errors,
        })
    }

    /// Runs the platform upload pipeline for one track
    async fn upload_one(
        &self,
        track: &TrackRecord,
        current: u32,
        total: u32,
        channel: &ProgressChannel,
    ) -> Result<UploadedTrack> {
        let bytes = self
            .library
            .read(&track.local_path)
            .await
            .with_context(|| format!("Failed to read {}", track.local_path.display()))?;

        let filename = track
            .local_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| track.title.clone());

        let sink = TrackLogBridge {
            channel,
            current,
            total,
            title: &track.title,
        };
        self.platform.upload_track(&filename, bytes, &sink).await
    }

    /// Refreshes the stored token pair when it is about to expire
    ///
    /// A failed refresh is terminal for the stored credentials: the
    /// caller gets [`PublishError::NotAuthenticated`] instead of a run
    /// that would fail on its first authenticated request.
    async fn ensure_fresh(&self) -> Result<(), PublishError> {
        let Some(auth) = &self.auth else {
            return Ok(());
        };
        let Some(credentials) = self.credentials.get().await? else {
            return Err(PublishError::NotAuthenticated);
        };
        if !credentials.expires_within(chrono::Duration::seconds(REFRESH_MARGIN_SECS)) {
            return Ok(());
        }

        info!("Access token near expiry, refreshing");
        let grant = match auth.refresh_tokens(credentials.refresh_token()).await {
            Ok(grant) => grant,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "Token refresh rejected");
                return Err(PublishError::NotAuthenticated);
            }
        };

        let mut fresh = Credentials::new(grant.access_token, grant.refresh_token)
            .map_err(|e| PublishError::Provider(e.into()))?;
        if let Some(user_id) = grant.user_id.as_deref().or(credentials.user_id()) {
            fresh = fresh.with_user_id(user_id);
        }
        if let Some(expires_at) = grant.expires_at {
            fresh = fresh.with_expires_at(expires_at);
        }

        self.credentials.save(&fresh).await?;
        self.platform.set_access_token(fresh.access_token()).await;
        Ok(())
    }
}

/// Forwards pipeline step lines from the platform adapter onto the
/// run's event stream as `log` events for the current track
struct TrackLogBridge<'a> {
    channel: &'a ProgressChannel,
    current: u32,
    total: u32,
    title: &'a str,
}

#[async_trait::async_trait]
impl IProgressSink for TrackLogBridge<'_> {
    async fn log(&self, message: &str) {
        self.channel
            .track_log(self.current, self.total, self.title, message)
            .await;
    }
}

/// Membership in the per-playlist run-lock set, released on drop
///
/// The spawned run task holds the guard for its whole lifetime, so the
/// lock is released whether the run completes, fails, or panics.
struct RunGuard {
    playlist_id: PlaylistId,
    in_flight: Arc<Mutex<HashSet<PlaylistId>>>,
}

impl RunGuard {
    fn acquire(
        in_flight: Arc<Mutex<HashSet<PlaylistId>>>,
        playlist_id: PlaylistId,
    ) -> Result<Self, PublishError> {
        {
            let mut held = in_flight.lock().unwrap_or_else(|e| e.into_inner());
            if !held.insert(playlist_id) {
                return Err(PublishError::PublishInProgress(playlist_id));
            }
        }
        Ok(Self {
            playlist_id,
            in_flight,
        })
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut held = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        held.remove(&self.playlist_id);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::Mutex as StdMutex;

    use anyhow::{anyhow, bail};
    use chrono::{Duration, Utc};

    use super::*;
    use cardpress_core::domain::PublishManifest;
    use cardpress_core::ports::{
        DeviceAuthorization, MemoryCredentialStore, PollOutcome, TokenGrant,
    };

    // ------------------------------------------------------------------
    // Port doubles
    // ------------------------------------------------------------------

    /// Platform double with scripted per-track upload outcomes
    struct ScriptedPlatform {
        uploads: StdMutex<VecDeque<Result<UploadedTrack>>>,
        uploaded_files: StdMutex<Vec<String>>,
        submitted: StdMutex<Vec<PublishManifest>>,
        submit_card_id: Option<CardId>,
        tokens_applied: StdMutex<Vec<String>>,
    }

    impl ScriptedPlatform {
        fn new(uploads: Vec<Result<UploadedTrack>>, submit_card_id: Option<&str>) -> Self {
            Self {
                uploads: StdMutex::new(uploads.into()),
                uploaded_files: StdMutex::new(Vec::new()),
                submitted: StdMutex::new(Vec::new()),
                submit_card_id: submit_card_id.map(|id| CardId::new(id.to_string()).unwrap()),
                tokens_applied: StdMutex::new(Vec::new()),
            }
        }

        fn uploaded_files(&self) -> Vec<String> {
            self.uploaded_files.lock().unwrap().clone()
        }

        fn submitted(&self) -> Vec<PublishManifest> {
            self.submitted.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl ICardPlatform for ScriptedPlatform {
        async fn upload_track(
            &self,
            filename: &str,
            _bytes: Vec<u8>,
            progress: &dyn IProgressSink,
        ) -> Result<UploadedTrack> {
            progress.log(&format!("hashing {filename}")).await;
            self.uploaded_files.lock().unwrap().push(filename.to_string());
            self.uploads
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(anyhow!("unscripted upload for {filename}")))
        }

        async fn submit_manifest(&self, manifest: &PublishManifest) -> Result<CardId> {
            self.submitted.lock().unwrap().push(manifest.clone());
            match &self.submit_card_id {
                Some(card_id) => Ok(card_id.clone()),
                None => bail!("card rejected by platform"),
            }
        }

        async fn set_access_token(&self, token: &str) {
            self.tokens_applied.lock().unwrap().push(token.to_string());
        }
    }

    /// Track source double holding one playlist
    struct OnePlaylist {
        playlist: Option<PlaylistRecord>,
        card_ids_set: StdMutex<Vec<CardId>>,
    }

    #[async_trait::async_trait]
    impl ITrackSource for OnePlaylist {
        async fn playlist(&self, id: &PlaylistId) -> Result<Option<PlaylistRecord>> {
            Ok(self.playlist.clone().filter(|p| p.id == *id))
        }

        async fn set_card_id(&self, _id: &PlaylistId, card_id: &CardId) -> Result<()> {
            self.card_ids_set.lock().unwrap().push(card_id.clone());
            Ok(())
        }
    }

    /// Library double where every file exists unless listed missing
    struct FakeLibrary {
        missing: Vec<PathBuf>,
    }

    #[async_trait::async_trait]
    impl ILocalLibrary for FakeLibrary {
        async fn exists(&self, path: &std::path::Path) -> Result<bool> {
            Ok(!self.missing.iter().any(|m| m == path))
        }

        async fn read(&self, path: &std::path::Path) -> Result<Vec<u8>> {
            Ok(path.to_string_lossy().into_owned().into_bytes())
        }
    }

    /// Auth double that grants one scripted refresh
    struct RefreshAuth {
        grant: Result<TokenGrant>,
    }

    #[async_trait::async_trait]
    impl IDeviceAuth for RefreshAuth {
        async fn request_code(&self) -> Result<DeviceAuthorization> {
            bail!("not used")
        }

        async fn poll_token(&self, _device_code: &str) -> Result<PollOutcome> {
            bail!("not used")
        }

        async fn refresh_tokens(&self, _refresh_token: &str) -> Result<TokenGrant> {
            match &self.grant {
                Ok(grant) => Ok(grant.clone()),
                Err(err) => bail!("{err}"),
            }
        }
    }

    // ------------------------------------------------------------------
    // Fixtures
    // ------------------------------------------------------------------

    fn track(title: &str) -> TrackRecord {
        TrackRecord {
            title: title.to_string(),
            local_path: PathBuf::from(format!("/music/{title}.mp3")),
            duration_secs: Some(120),
        }
    }

    fn playlist(card_id: Option<&str>) -> PlaylistRecord {
        PlaylistRecord {
            id: PlaylistId::new(),
            name: "Bedtime Stories".to_string(),
            card_id: card_id.map(|id| CardId::new(id.to_string()).unwrap()),
            tracks: vec![track("One"), track("Two"), track("Three")],
        }
    }

    fn uploaded(asset_key: &str) -> UploadedTrack {
        UploadedTrack {
            asset_key: asset_key.to_string(),
            duration_secs: Some(121),
            file_size: Some(2048),
            channels: Some("stereo".to_string()),
            format: Some("aac".to_string()),
        }
    }

    fn authenticated_cache() -> Arc<CredentialCache> {
        let credentials =
            Credentials::new("access".to_string(), "refresh".to_string()).unwrap();
        Arc::new(CredentialCache::new(Arc::new(
            MemoryCredentialStore::with_credentials(credentials),
        )))
    }

    fn engine_for(
        platform: Arc<ScriptedPlatform>,
        playlist: PlaylistRecord,
        cache: Arc<CredentialCache>,
    ) -> (PublishEngine, PlaylistId, Arc<OnePlaylist>) {
        let playlist_id = playlist.id;
        let tracks = Arc::new(OnePlaylist {
            playlist: Some(playlist),
            card_ids_set: StdMutex::new(Vec::new()),
        });
        let library = Arc::new(FakeLibrary { missing: Vec::new() });
        let engine = PublishEngine::new(platform, tracks.clone(), library, cache);
        (engine, playlist_id, tracks)
    }

    async fn collect(mut rx: mpsc::Receiver<ProgressEvent>) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    // ------------------------------------------------------------------
    // Precondition tests
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_unauthenticated_publish_issues_zero_platform_calls() {
        let platform = Arc::new(ScriptedPlatform::new(Vec::new(), Some("card-1")));
        let cache = Arc::new(CredentialCache::new(Arc::new(MemoryCredentialStore::new())));
        let (engine, playlist_id, _) = engine_for(platform.clone(), playlist(None), cache);

        let result = engine.publish(playlist_id).await;

        assert!(matches!(result, Err(PublishError::NotAuthenticated)));
        assert!(platform.uploaded_files().is_empty());
        assert!(platform.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_playlist_is_rejected() {
        let platform = Arc::new(ScriptedPlatform::new(Vec::new(), Some("card-1")));
        let (engine, _, _) = engine_for(platform, playlist(None), authenticated_cache());

        let other = PlaylistId::new();
        let result = engine.publish(other).await;

        assert!(matches!(result, Err(PublishError::PlaylistNotFound(id)) if id == other));
    }

    #[tokio::test]
    async fn test_empty_playlist_is_rejected() {
        let platform = Arc::new(ScriptedPlatform::new(Vec::new(), Some("card-1")));
        let mut record = playlist(None);
        record.tracks.clear();
        let (engine, playlist_id, _) = engine_for(platform, record, authenticated_cache());

        let result = engine.publish(playlist_id).await;
        assert!(matches!(result, Err(PublishError::EmptyPlaylist(name)) if name == "Bedtime Stories"));
    }

    #[tokio::test]
    async fn test_missing_local_asset_fails_before_any_upload() {
        let platform = Arc::new(ScriptedPlatform::new(Vec::new(), Some("card-1")));
        let record = playlist(None);
        let playlist_id = record.id;
        let tracks = Arc::new(OnePlaylist {
            playlist: Some(record),
            card_ids_set: StdMutex::new(Vec::new()),
        });
        let library = Arc::new(FakeLibrary {
            missing: vec![PathBuf::from("/music/Two.mp3")],
        });
        let engine = PublishEngine::new(platform.clone(), tracks, library, authenticated_cache());

        let result = engine.publish(playlist_id).await;

        match result {
            Err(PublishError::MissingLocalAsset { title, path }) => {
                assert_eq!(title, "Two");
                assert_eq!(path, PathBuf::from("/music/Two.mp3"));
            }
            other => panic!("expected MissingLocalAsset, got {other:?}"),
        }
        assert!(platform.uploaded_files().is_empty());
    }

    #[tokio::test]
    async fn test_overlapping_run_for_same_playlist_is_rejected() {
        let platform = Arc::new(ScriptedPlatform::new(Vec::new(), Some("card-1")));
        let (engine, playlist_id, _) = engine_for(platform, playlist(None), authenticated_cache());

        // Simulate a run already holding the lock
        let _held = RunGuard::acquire(Arc::clone(&engine.in_flight), playlist_id).unwrap();

        let result = engine.publish(playlist_id).await;
        assert!(matches!(result, Err(PublishError::PublishInProgress(id)) if id == playlist_id));
    }

    #[test]
    fn test_run_guard_releases_on_drop() {
        let in_flight = Arc::new(Mutex::new(HashSet::new()));
        let playlist_id = PlaylistId::new();

        let guard = RunGuard::acquire(Arc::clone(&in_flight), playlist_id).unwrap();
        assert!(RunGuard::acquire(Arc::clone(&in_flight), playlist_id).is_err());

        drop(guard);
        assert!(RunGuard::acquire(in_flight, playlist_id).is_ok());
    }

    // ------------------------------------------------------------------
    // Run behaviour
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_mid_list_failure_keeps_original_numbering() {
        let platform = Arc::new(ScriptedPlatform::new(
            vec![
                Ok(uploaded("asset-1")),
                Err(anyhow!("transfer failed with status 500")),
                Ok(uploaded("asset-3")),
            ],
            Some("card-1"),
        ));
        let (engine, playlist_id, _) =
            engine_for(platform.clone(), playlist(None), authenticated_cache());

        let events = collect(engine.publish(playlist_id).await.unwrap()).await;

        // Terminal done with exactly one recorded failure
        let Some(ProgressEvent::RunCompleted {
            uploaded_tracks,
            errors,
            ..
        }) = events.last()
        else {
            panic!("expected RunCompleted, got {:?}", events.last());
        };
        assert_eq!(*uploaded_tracks, 2);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].track_number, 2);
        assert_eq!(errors[0].title, "Two");

        // The manifest skips track 2 but keeps positions 1 and 3
        let submitted = platform.submitted();
        assert_eq!(submitted.len(), 1);
        let numbers: Vec<u32> = submitted[0].tracks().iter().map(|t| t.track_number).collect();
        assert_eq!(numbers, vec![1, 3]);

        // All three files were attempted, in playlist order
        assert_eq!(
            platform.uploaded_files(),
            vec!["One.mp3", "Two.mp3", "Three.mp3"]
        );
    }

    #[tokio::test]
    async fn test_all_tracks_failed_never_submits() {
        let platform = Arc::new(ScriptedPlatform::new(
            vec![
                Err(anyhow!("boom 1")),
                Err(anyhow!("boom 2")),
                Err(anyhow!("boom 3")),
            ],
            Some("card-1"),
        ));
        let (engine, playlist_id, tracks) =
            engine_for(platform.clone(), playlist(None), authenticated_cache());

        let events = collect(engine.publish(playlist_id).await.unwrap()).await;

        assert!(matches!(events.last(), Some(ProgressEvent::RunFailed { .. })));
        assert!(platform.submitted().is_empty());
        assert!(tracks.card_ids_set.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_event_order_and_single_terminal() {
        let platform = Arc::new(ScriptedPlatform::new(
            vec![
                Ok(uploaded("a")),
                Err(anyhow!("boom")),
                Ok(uploaded("c")),
            ],
            Some("card-1"),
        ));
        let (engine, playlist_id, _) =
            engine_for(platform, playlist(None), authenticated_cache());

        let events = collect(engine.publish(playlist_id).await.unwrap()).await;

        // Exactly one terminal event, and it is last
        let terminal_count = events.iter().filter(|e| e.is_terminal()).count();
        assert_eq!(terminal_count, 1);
        assert!(events.last().unwrap().is_terminal());

        // Per track: start, log (from the adapter), then complete/error
        let kinds: Vec<&str> = events
            .iter()
            .map(|e| match e {
                ProgressEvent::TrackStarted { .. } => "start",
                ProgressEvent::TrackLog { .. } => "log",
                ProgressEvent::TrackCompleted { .. } => "complete",
                ProgressEvent::TrackFailed { .. } => "error",
                ProgressEvent::RunCompleted { .. } => "done",
                ProgressEvent::RunFailed { .. } => "failed",
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                "start", "log", "complete", // track 1
                "start", "log", "error", // track 2
                "start", "log", "complete", // track 3
                "done",
            ]
        );
    }

    #[tokio::test]
    async fn test_submit_rejection_fails_the_run() {
        let platform = Arc::new(ScriptedPlatform::new(
            vec![
                Ok(uploaded("a")),
                Ok(uploaded("b")),
                Ok(uploaded("c")),
            ],
            None, // submit rejects
        ));
        let (engine, playlist_id, tracks) =
            engine_for(platform, playlist(None), authenticated_cache());

        let events = collect(engine.publish(playlist_id).await.unwrap()).await;

        let Some(ProgressEvent::RunFailed { error }) = events.last() else {
            panic!("expected RunFailed, got {:?}", events.last());
        };
        assert!(error.contains("card rejected by platform"));
        assert!(tracks.card_ids_set.lock().unwrap().is_empty());
    }

    // ------------------------------------------------------------------
    // Card id semantics
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_stored_card_id_is_submitted_and_not_re_persisted() {
        let platform = Arc::new(ScriptedPlatform::new(
            vec![
                Ok(uploaded("a")),
                Ok(uploaded("b")),
                Ok(uploaded("c")),
            ],
            Some("card-42"), // platform echoes the stored id back
        ));
        let (engine, playlist_id, tracks) =
            engine_for(platform.clone(), playlist(Some("card-42")), authenticated_cache());

        let summary = engine.publish_and_wait(playlist_id).await.unwrap();

        assert_eq!(summary.card_id.as_str(), "card-42");
        let submitted = platform.submitted();
        assert_eq!(submitted[0].card_id().map(CardId::as_str), Some("card-42"));
        // Unchanged id is not written back
        assert!(tracks.card_ids_set.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_new_card_id_is_persisted() {
        let platform = Arc::new(ScriptedPlatform::new(
            vec![
                Ok(uploaded("a")),
                Ok(uploaded("b")),
                Ok(uploaded("c")),
            ],
            Some("card-fresh"),
        ));
        let (engine, playlist_id, tracks) =
            engine_for(platform, playlist(None), authenticated_cache());

        let summary = engine.publish_and_wait(playlist_id).await.unwrap();

        assert_eq!(summary.card_id.as_str(), "card-fresh");
        let persisted = tracks.card_ids_set.lock().unwrap().clone();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].as_str(), "card-fresh");
    }

    // ------------------------------------------------------------------
    // One-shot wrapper
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_publish_and_wait_surfaces_run_failure() {
        let platform = Arc::new(ScriptedPlatform::new(
            vec![
                Err(anyhow!("boom")),
                Err(anyhow!("boom")),
                Err(anyhow!("boom")),
            ],
            Some("card-1"),
        ));
        let (engine, playlist_id, _) =
            engine_for(platform, playlist(None), authenticated_cache());

        let result = engine.publish_and_wait(playlist_id).await;
        let message = result.unwrap_err().to_string();
        assert!(message.contains("3 track uploads failed"), "got: {message}");
    }

    // ------------------------------------------------------------------
    // Token refresh
    // ------------------------------------------------------------------

    fn expiring_cache() -> Arc<CredentialCache> {
        let credentials = Credentials::new("stale".to_string(), "refresh".to_string())
            .unwrap()
            .with_expires_at(Utc::now() + Duration::seconds(10));
        Arc::new(CredentialCache::new(Arc::new(
            MemoryCredentialStore::with_credentials(credentials),
        )))
    }

    #[tokio::test]
    async fn test_near_expiry_token_is_refreshed_before_uploads() {
        let platform = Arc::new(ScriptedPlatform::new(
            vec![
                Ok(uploaded("a")),
                Ok(uploaded("b")),
                Ok(uploaded("c")),
            ],
            Some("card-1"),
        ));
        let cache = expiring_cache();
        let (engine, playlist_id, _) =
            engine_for(platform.clone(), playlist(None), cache.clone());
        let engine = engine.with_auth(Arc::new(RefreshAuth {
            grant: Ok(TokenGrant {
                access_token: "fresh".to_string(),
                refresh_token: "refresh-2".to_string(),
                user_id: Some("auth0|user".to_string()),
                expires_at: Some(Utc::now() + Duration::hours(1)),
            }),
        }));

        engine.publish_and_wait(playlist_id).await.unwrap();

        // The refreshed pair is cached and applied to the platform
        let cached = cache.get().await.unwrap().unwrap();
        assert_eq!(cached.access_token(), "fresh");
        assert_eq!(cached.refresh_token(), "refresh-2");
        assert_eq!(
            platform.tokens_applied.lock().unwrap().clone(),
            vec!["fresh"]
        );
    }

    #[tokio::test]
    async fn test_refresh_rejection_surfaces_not_authenticated() {
        let platform = Arc::new(ScriptedPlatform::new(Vec::new(), Some("card-1")));
        let (engine, playlist_id, _) =
            engine_for(platform.clone(), playlist(None), expiring_cache());
        let engine = engine.with_auth(Arc::new(RefreshAuth {
            grant: Err(anyhow!("invalid refresh token")),
        }));

        let result = engine.publish(playlist_id).await;

        assert!(matches!(result, Err(PublishError::NotAuthenticated)));
        assert!(platform.uploaded_files().is_empty());
    }

    #[tokio::test]
    async fn test_valid_token_is_not_refreshed() {
        let platform = Arc::new(ScriptedPlatform::new(
            vec![
                Ok(uploaded("a")),
                Ok(uploaded("b")),
                Ok(uploaded("c")),
            ],
            Some("card-1"),
        ));
        let credentials = Credentials::new("good".to_string(), "refresh".to_string())
            .unwrap()
            .with_expires_at(Utc::now() + Duration::hours(2));
        let cache = Arc::new(CredentialCache::new(Arc::new(
            MemoryCredentialStore::with_credentials(credentials),
        )));
        let (engine, playlist_id, _) = engine_for(platform.clone(), playlist(None), cache);
        let engine = engine.with_auth(Arc::new(RefreshAuth {
            grant: Err(anyhow!("refresh should not be called")),
        }));

        engine.publish_and_wait(playlist_id).await.unwrap();
        assert!(platform.tokens_applied.lock().unwrap().is_empty());
    }
}
