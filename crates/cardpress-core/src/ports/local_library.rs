//! Local audio file port
//!
//! Access to the audio files referenced by playlist tracks. Kept minimal:
//! the engine checks presence up front and reads whole files before
//! handing bytes to the platform adapter.

use std::path::Path;

use anyhow::Result;

/// Port for local audio file access
#[async_trait::async_trait]
pub trait ILocalLibrary: Send + Sync {
    /// Whether a readable file exists at the given path
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Read the full content of an audio file
    ///
    /// # Errors
    /// Returns an error when the file cannot be read.
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;
}
