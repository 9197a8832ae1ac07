//! File-backed playlist library
//!
//! Playlists live as one JSON document per file in the library
//! directory, `<library>/<name>.json`. Track `file` paths are resolved
//! relative to the library directory, so a library folder can be moved
//! wholesale without editing its documents.
//!
//! [`FileLibrary`] implements both library-facing ports of the publish
//! engine: playlist metadata ([`ITrackSource`]) and audio file access
//! ([`ILocalLibrary`]).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use cardpress_core::domain::{CardId, PlaylistId, PlaylistRecord, TrackRecord};
use cardpress_core::ports::{ILocalLibrary, ITrackSource};

/// On-disk playlist document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistDocument {
    id: PlaylistId,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    card_id: Option<CardId>,
    tracks: Vec<TrackDocument>,
}

/// One track entry of a playlist document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackDocument {
    title: String,
    /// Audio file path, relative to the library directory unless absolute
    file: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<u32>,
}

/// One row of a library listing
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistSummary {
    pub id: PlaylistId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_id: Option<CardId>,
    pub tracks: usize,
}

/// Playlist library rooted at a directory of JSON documents
pub struct FileLibrary {
    dir: PathBuf,
}

impl FileLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Library root directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// List every playlist document, sorted by name
    ///
    /// A missing library directory is an empty library, not an error.
    ///
    /// # Errors
    /// Returns an error when a document exists but cannot be parsed.
    pub async fn list(&self) -> Result<Vec<PlaylistSummary>> {
        let mut summaries = Vec::new();
        for path in self.document_paths().await? {
            let doc = self.load_document(&path).await?;
            summaries.push(PlaylistSummary {
                id: doc.id,
                name: doc.name,
                card_id: doc.card_id,
                tracks: doc.tracks.len(),
            });
        }
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(summaries)
    }

    /// Resolve a playlist by id or by name
    ///
    /// Accepts a playlist UUID, the document's `name` field, or the
    /// document's file stem, in that order of preference.
    pub async fn resolve(&self, reference: &str) -> Result<Option<PlaylistRecord>> {
        if let Ok(id) = reference.parse::<PlaylistId>() {
            return self.playlist_record(&id).await;
        }

        for path in self.document_paths().await? {
            let doc = self.load_document(&path).await?;
            let stem_matches = path
                .file_stem()
                .is_some_and(|stem| stem.to_string_lossy() == reference);
            if doc.name == reference || stem_matches {
                return Ok(Some(self.to_record(doc)));
            }
        }
        Ok(None)
    }

    async fn playlist_record(&self, id: &PlaylistId) -> Result<Option<PlaylistRecord>> {
        for path in self.document_paths().await? {
            let doc = self.load_document(&path).await?;
            if doc.id == *id {
                return Ok(Some(self.to_record(doc)));
            }
        }
        Ok(None)
    }

    /// All `.json` documents in the library directory, in stable order
    async fn document_paths(&self) -> Result<Vec<PathBuf>> {
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read library {}", self.dir.display()))
            }
        };

        let mut paths = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    async fn load_document(&self, path: &Path) -> Result<PlaylistDocument> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read playlist {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid playlist document {}", path.display()))
    }

    async fn save_document(&self, path: &Path, doc: &PlaylistDocument) -> Result<()> {
        let mut content = serde_json::to_string_pretty(doc)?;
        content.push('\n');
        tokio::fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write playlist {}", path.display()))
    }

    fn to_record(&self, doc: PlaylistDocument) -> PlaylistRecord {
        let tracks = doc
            .tracks
            .into_iter()
            .map(|track| TrackRecord {
                title: track.title,
                local_path: self.resolve_path(track.file),
                duration_secs: track.duration_secs,
            })
            .collect();

        PlaylistRecord {
            id: doc.id,
            name: doc.name,
            card_id: doc.card_id,
            tracks,
        }
    }

    fn resolve_path(&self, file: PathBuf) -> PathBuf {
        if file.is_absolute() {
            file
        } else {
            self.dir.join(file)
        }
    }
}

#[async_trait::async_trait]
impl ITrackSource for FileLibrary {
    async fn playlist(&self, id: &PlaylistId) -> Result<Option<PlaylistRecord>> {
        self.playlist_record(id).await
    }

    async fn set_card_id(&self, id: &PlaylistId, card_id: &CardId) -> Result<()> {
        for path in self.document_paths().await? {
            let mut doc = self.load_document(&path).await?;
            if doc.id == *id {
                doc.card_id = Some(card_id.clone());
                return self.save_document(&path, &doc).await;
            }
        }
        anyhow::bail!("No playlist document with id {id}")
    }
}

#[async_trait::async_trait]
impl ILocalLibrary for FileLibrary {
    async fn exists(&self, path: &Path) -> Result<bool> {
        match tokio::fs::metadata(path).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("Failed to stat {}", path.display())),
        }
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))
    }
}
