//! Cardpress Yoto - Yoto API adapter
//!
//! Provides async clients for:
//! - Device-code authentication (RFC 8628 device authorization grant)
//! - Audio upload with hash-based dedup and transcode tracking
//! - MYO card content submission (create or update)
//! - Credential persistence in the system keyring
//!
//! ## Modules
//!
//! - [`auth`] - Device-code flow and token refresh
//! - [`client`] - Yoto API HTTP client (bearer auth, base URL handling)
//! - [`content`] - Card content payloads and submission
//! - [`keyring_store`] - ICredentialStore backed by the OS keyring
//! - [`poll`] - Poll policies with injectable waiting
//! - [`provider`] - ICardPlatform implementation
//! - [`upload`] - Upload and transcode pipeline

pub mod auth;
pub mod client;
pub mod content;
pub mod keyring_store;
pub mod poll;
pub mod provider;
pub mod upload;

use thiserror::Error;

use cardpress_core::domain::UploadId;

/// Errors that can occur when talking to the Yoto API
#[derive(Debug, Error)]
pub enum YotoError {
    /// The device-code request was rejected or unreadable
    #[error("Device code request failed: {message}")]
    AuthRequestFailed {
        /// Description carried by the server response, or the transport error
        message: String,
    },

    /// The device code expired before the user approved it
    #[error("Device code expired; restart the login flow")]
    CodeExpired,

    /// The user has not approved the device code yet; poll again later
    #[error("Authorization pending")]
    AuthPending,

    /// The token endpoint asked for a slower poll cadence
    #[error("Polling too fast; slow down")]
    SlowDown {
        /// Replacement interval in seconds, when the server advertises one
        interval: Option<u64>,
    },

    /// The user rejected the authorization request
    #[error("Authorization denied: {description}")]
    AuthDenied {
        /// Server-supplied description, verbatim
        description: String,
    },

    /// The byte transfer to the upload URL failed
    #[error("Upload transfer failed with status {status}: {message}")]
    TransferFailed {
        /// HTTP status of the rejected transfer
        status: u16,
        /// Response body, when readable
        message: String,
    },

    /// Transcoding did not reach a terminal state within the poll budget
    #[error("Transcode of upload {upload_id} not ready after {attempts} polls")]
    TranscodeTimeout {
        /// Upload this poll loop was tracking
        upload_id: UploadId,
        /// Number of status polls issued before giving up
        attempts: u32,
    },

    /// Credentials are missing, invalid or expired
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The API returned an unexpected error status
    #[error("API error {status}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body, when readable
        message: String,
    },

    /// A network-level error occurred
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The API response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}
