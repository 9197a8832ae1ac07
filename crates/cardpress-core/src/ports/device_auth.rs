//! Device-code authorization port
//!
//! Abstracts the two endpoints of the RFC 8628 device grant: issuing a
//! user code and polling the token endpoint with the paired device code.
//! Each poll returns a typed [`PollOutcome`] so the use case layer can
//! drive the state machine without inspecting HTTP details.

use anyhow::Result;
use chrono::{DateTime, Utc};

/// Code issuance response from the authorization server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceAuthorization {
    /// Opaque code presented on every token poll
    pub device_code: String,
    /// Short code the user types at the verification page
    pub user_code: String,
    /// Verification page URL
    pub verification_uri: String,
    /// Verification URL with the user code pre-filled, when advertised
    pub verification_uri_complete: Option<String>,
    /// Lifetime of the user code in seconds
    pub expires_in_secs: u64,
    /// Minimum seconds between token polls
    pub interval_secs: u64,
}

/// Token pair granted on approval or refresh
///
/// The adapter decodes the access token claims before handing the grant
/// over; `user_id` and `expires_at` stay `None` when the token payload
/// is not decodable. Token format is a platform detail that never
/// crosses this boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: String,
    /// Subject claim of the access token, when decodable
    pub user_id: Option<String>,
    /// Expiry claim of the access token, when decodable
    pub expires_at: Option<DateTime<Utc>>,
}

/// Outcome of a single token poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The user approved; tokens were granted
    Approved(TokenGrant),
    /// The user has not decided yet; poll again after the interval
    Pending,
    /// Polling too fast; raise the interval before the next poll
    SlowDown {
        /// Server-advertised replacement interval, when present
        interval_secs: Option<u64>,
    },
    /// The user rejected the authorization request
    Denied { description: String },
    /// The server reports the device code as expired
    Expired,
}

/// Port for the device-code grant endpoints
#[async_trait::async_trait]
pub trait IDeviceAuth: Send + Sync {
    /// Request a new device/user code pair
    ///
    /// # Errors
    /// Returns an error when the request fails or the response cannot be
    /// parsed; the message carries the server's own description.
    async fn request_code(&self) -> Result<DeviceAuthorization>;

    /// Poll the token endpoint once for the given device code
    ///
    /// Flow-control responses (`pending`, `slow_down`) are values, not
    /// errors; only transport failures and malformed responses are `Err`.
    async fn poll_token(&self, device_code: &str) -> Result<PollOutcome>;

    /// Exchange a refresh token for a fresh pair
    ///
    /// # Errors
    /// Returns an error when the grant is rejected or the request fails.
    async fn refresh_tokens(&self, refresh_token: &str) -> Result<TokenGrant>;
}
