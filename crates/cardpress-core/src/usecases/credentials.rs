//! Credential cache use case
//!
//! One `CredentialCache` is the process-wide authority on the stored
//! credential pair. It reads through to the credential store lazily and
//! keeps the loaded value until a save or clear replaces it, so every
//! component observes the same credential state without re-reading the
//! secret backend on each call.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Mutex;

use crate::domain::Credentials;
use crate::ports::ICredentialStore;

/// Cached front of the credential store
///
/// The outer `Option` distinguishes "not loaded yet" from "loaded and
/// known to be absent", so a miss is cached just like a hit.
pub struct CredentialCache {
    store: Arc<dyn ICredentialStore + Send + Sync>,
    cached: Mutex<Option<Option<Credentials>>>,
}

impl CredentialCache {
    /// Creates a cache over the given credential store
    pub fn new(store: Arc<dyn ICredentialStore + Send + Sync>) -> Self {
        Self {
            store,
            cached: Mutex::new(None),
        }
    }

    /// The stored credential pair, if any
    ///
    /// Loads from the store on first access, then serves the cached
    /// value until the next save or clear.
    ///
    /// # Errors
    /// Returns an error if the store read fails
    pub async fn get(&self) -> Result<Option<Credentials>> {
        let mut cached = self.cached.lock().await;
        if let Some(value) = cached.as_ref() {
            return Ok(value.clone());
        }

        let loaded = self
            .store
            .get()
            .await
            .context("Failed to load credentials from store")?;
        *cached = Some(loaded.clone());
        Ok(loaded)
    }

    /// Whether a credential pair is currently stored
    ///
    /// # Errors
    /// Returns an error if the store read fails
    pub async fn is_authenticated(&self) -> Result<bool> {
        Ok(self.get().await?.is_some())
    }

    /// Persist a credential pair and refresh the cached value
    ///
    /// # Errors
    /// Returns an error if the store write fails; the cache keeps its
    /// previous value in that case.
    pub async fn save(&self, credentials: &Credentials) -> Result<()> {
        self.store
            .save(credentials)
            .await
            .context("Failed to persist credentials")?;
        *self.cached.lock().await = Some(Some(credentials.clone()));
        Ok(())
    }

    /// Remove the stored credential pair and refresh the cached value
    ///
    /// # Errors
    /// Returns an error if the store delete fails; the cache keeps its
    /// previous value in that case.
    pub async fn clear(&self) -> Result<()> {
        self.store
            .clear()
            .await
            .context("Failed to clear credentials")?;
        *self.cached.lock().await = Some(None);
        Ok(())
    }
}
