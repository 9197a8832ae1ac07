//! Credential storage port
//!
//! Persistent storage for the credential pair. The keyring-backed
//! implementation lives in the platform adapter crate; the in-memory
//! implementation here serves headless environments without a secret
//! service, and doubles as the storage used by tests.

use anyhow::Result;
use tokio::sync::Mutex;

use crate::domain::Credentials;

/// Port for credential persistence
#[async_trait::async_trait]
pub trait ICredentialStore: Send + Sync {
    /// Load the stored credential pair, if any
    async fn get(&self) -> Result<Option<Credentials>>;

    /// Persist the credential pair, replacing any previous one
    async fn save(&self, credentials: &Credentials) -> Result<()>;

    /// Remove the stored credential pair
    ///
    /// Clearing an empty store is not an error.
    async fn clear(&self) -> Result<()>;
}

/// In-memory credential store
#[derive(Default)]
pub struct MemoryCredentialStore {
    inner: Mutex<Option<Credentials>>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds credentials
    #[must_use]
    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            inner: Mutex::new(Some(credentials)),
        }
    }
}

#[async_trait::async_trait]
impl ICredentialStore for MemoryCredentialStore {
    async fn get(&self) -> Result<Option<Credentials>> {
        Ok(self.inner.lock().await.clone())
    }

    async fn save(&self, credentials: &Credentials) -> Result<()> {
        *self.inner.lock().await = Some(credentials.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.inner.lock().await = None;
        Ok(())
    }
}
