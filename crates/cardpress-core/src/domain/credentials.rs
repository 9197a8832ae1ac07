//! Credential entity for the remote platform
//!
//! Holds the access/refresh token pair obtained through the device-code
//! flow. The pair is indivisible: a `Credentials` value always carries
//! both tokens, so a caller either has a complete credential set or none
//! at all. Partial state is unrepresentable.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Access and refresh tokens for the remote platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    access_token: String,
    refresh_token: String,
    /// Subject extracted from the access token claims; `None` when the
    /// token payload could not be decoded.
    user_id: Option<String>,
    /// Access token expiry from the `exp` claim; `None` when unknown.
    expires_at: Option<DateTime<Utc>>,
}

impl Credentials {
    /// Create a new credential pair
    ///
    /// # Errors
    /// Returns `DomainError::InvalidCredentials` if either token is empty
    pub fn new(access_token: String, refresh_token: String) -> Result<Self, DomainError> {
        if access_token.is_empty() {
            return Err(DomainError::InvalidCredentials(
                "access token is empty".to_string(),
            ));
        }
        if refresh_token.is_empty() {
            return Err(DomainError::InvalidCredentials(
                "refresh token is empty".to_string(),
            ));
        }

        Ok(Self {
            access_token,
            refresh_token,
            user_id: None,
            expires_at: None,
        })
    }

    /// Attach the user identifier decoded from the token claims
    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Attach the access token expiry decoded from the token claims
    #[must_use]
    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// The bearer access token
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// The refresh token for renewing the pair
    #[must_use]
    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    /// The authenticated user's platform identifier, when known
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Access token expiry, when known
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Whether the access token is already past its expiry
    ///
    /// Returns `false` when the expiry is unknown.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() >= expires_at,
            None => false,
        }
    }

    /// Whether the access token expires within the given duration
    ///
    /// Returns `false` when the expiry is unknown.
    #[must_use]
    pub fn expires_within(&self, duration: Duration) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() + duration >= expires_at,
            None => false,
        }
    }
}
