//! Credential persistence in the system keyring
//!
//! Stores the credential pair as a JSON blob in the OS credential store
//! (GNOME Keyring, KDE Wallet, macOS Keychain) under the `cardpress`
//! service. The keyring API is blocking, so every operation runs on the
//! tokio blocking pool.

use anyhow::{Context, Result};
use tracing::{debug, info};

use cardpress_core::domain::Credentials;
use cardpress_core::ports::credential_store::ICredentialStore;

/// Keyring service name for storing credentials
const KEYRING_SERVICE: &str = "cardpress";

/// Keyring account name under which the credential blob lives
const KEYRING_ACCOUNT: &str = "tokens";

/// Credential store backed by the OS keyring
///
/// A missing entry maps to `Ok(None)` on get and `Ok(())` on clear;
/// only secret-service failures surface as errors.
pub struct KeyringCredentialStore {
    service: String,
    account: String,
}

impl KeyringCredentialStore {
    /// Creates a store under the default `cardpress` service
    pub fn new() -> Self {
        Self {
            service: KEYRING_SERVICE.to_string(),
            account: KEYRING_ACCOUNT.to_string(),
        }
    }

    /// Creates a store under a custom service name
    ///
    /// Lets tests target a scratch keyring entry instead of the real one.
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: KEYRING_ACCOUNT.to_string(),
        }
    }

    fn entry(service: &str, account: &str) -> Result<keyring::Entry> {
        keyring::Entry::new(service, account).context("Failed to create keyring entry")
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ICredentialStore for KeyringCredentialStore {
    async fn get(&self) -> Result<Option<Credentials>> {
        let service = self.service.clone();
        let account = self.account.clone();

        let json = tokio::task::spawn_blocking(move || -> Result<Option<String>> {
            let entry = Self::entry(&service, &account)?;
            match entry.get_password() {
                Ok(json) => Ok(Some(json)),
                Err(keyring::Error::NoEntry) => Ok(None),
                Err(e) => Err(anyhow::Error::new(e).context("Failed to read from keyring")),
            }
        })
        .await
        .context("Keyring read task failed")??;

        match json {
            Some(json) => {
                let credentials: Credentials = serde_json::from_str(&json)
                    .context("Failed to deserialize credentials from keyring")?;
                debug!("Loaded credentials from keyring");
                Ok(Some(credentials))
            }
            None => {
                debug!("No credentials in keyring");
                Ok(None)
            }
        }
    }

    async fn save(&self, credentials: &Credentials) -> Result<()> {
        let service = self.service.clone();
        let account = self.account.clone();
        let json = serde_json::to_string(credentials).context("Failed to serialize credentials")?;

        tokio::task::spawn_blocking(move || -> Result<()> {
            let entry = Self::entry(&service, &account)?;
            entry
                .set_password(&json)
                .context("Failed to store credentials in keyring")
        })
        .await
        .context("Keyring write task failed")??;

        debug!("Stored credentials in keyring");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let service = self.service.clone();
        let account = self.account.clone();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let entry = Self::entry(&service, &account)?;
            match entry.delete_credential() {
                Ok(()) => Ok(()),
                Err(keyring::Error::NoEntry) => Ok(()),
                Err(e) => Err(anyhow::Error::new(e).context("Failed to delete from keyring")),
            }
        })
        .await
        .context("Keyring delete task failed")??;

        info!("Cleared credentials from keyring");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_blob_roundtrip() {
        let credentials = Credentials::new("access".to_string(), "refresh".to_string())
            .unwrap()
            .with_user_id("user-1");

        let json = serde_json::to_string(&credentials).unwrap();
        let parsed: Credentials = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, credentials);
    }
}
