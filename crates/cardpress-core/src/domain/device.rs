//! Device-code authorization session
//!
//! A `DeviceSession` is the in-memory state of one device-code grant:
//! the opaque device code, the short code the user types in, and the
//! expiry/polling parameters advertised by the authorization server.
//! Sessions never touch persistent storage; they live for the duration
//! of one login attempt and are discarded on approval, denial or expiry.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Phase of the device-code login state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoginPhase {
    /// No login in progress
    #[default]
    Idle,
    /// A user code has been issued but not yet polled for
    CodeRequested,
    /// Polling the token endpoint while the user approves
    Polling,
    /// The user approved and credentials were stored
    Approved,
    /// The user rejected the authorization request
    Denied,
    /// The user code lapsed before approval
    Expired,
    /// The authorization server rejected the attempt
    Failed,
}

impl LoginPhase {
    /// Whether the flow has reached a terminal outcome
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Approved | Self::Denied | Self::Expired | Self::Failed
        )
    }

    /// Whether a login attempt is currently underway
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::CodeRequested | Self::Polling)
    }
}

impl std::fmt::Display for LoginPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::CodeRequested => "code_requested",
            Self::Polling => "polling",
            Self::Approved => "approved",
            Self::Denied => "denied",
            Self::Expired => "expired",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// State of one device-code authorization attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSession {
    device_code: String,
    user_code: String,
    verification_uri: String,
    verification_uri_complete: Option<String>,
    created_at: DateTime<Utc>,
    expires_in_secs: u64,
    poll_interval_secs: u64,
}

impl DeviceSession {
    /// Create a session from the authorization server's code response
    #[must_use]
    pub fn new(
        device_code: String,
        user_code: String,
        verification_uri: String,
        verification_uri_complete: Option<String>,
        expires_in_secs: u64,
        poll_interval_secs: u64,
    ) -> Self {
        Self {
            device_code,
            user_code,
            verification_uri,
            verification_uri_complete,
            created_at: Utc::now(),
            expires_in_secs,
            // Servers that omit the interval expect the RFC 8628 default
            poll_interval_secs: poll_interval_secs.max(1),
        }
    }

    /// Override the creation timestamp (session restore and tests)
    #[must_use]
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// The opaque code presented to the token endpoint on each poll
    #[must_use]
    pub fn device_code(&self) -> &str {
        &self.device_code
    }

    /// The short code the user types at the verification page
    #[must_use]
    pub fn user_code(&self) -> &str {
        &self.user_code
    }

    /// Verification page URL
    #[must_use]
    pub fn verification_uri(&self) -> &str {
        &self.verification_uri
    }

    /// Verification URL with the user code pre-filled, when advertised
    #[must_use]
    pub fn verification_uri_complete(&self) -> Option<&str> {
        self.verification_uri_complete.as_deref()
    }

    /// When the session was created
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Instant after which the user code is no longer redeemable
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at + Duration::seconds(self.expires_in_secs as i64)
    }

    /// Whether the user code has lapsed
    ///
    /// Expiry is enforced locally: callers must check this before each
    /// poll so an expired session never reaches the network.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at()
    }

    /// Seconds remaining until expiry (zero once expired)
    #[must_use]
    pub fn seconds_remaining(&self) -> u64 {
        let remaining = self.expires_at() - Utc::now();
        remaining.num_seconds().max(0) as u64
    }

    /// Current wait between token polls
    #[must_use]
    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll_interval_secs)
    }

    /// Raise the poll interval after a `slow_down` response
    ///
    /// Uses the server-advertised interval when present, otherwise the
    /// current interval plus five seconds. The interval never decreases.
    pub fn apply_slow_down(&mut self, advertised_secs: Option<u64>) {
        let requested = advertised_secs.unwrap_or(self.poll_interval_secs + 5);
        if requested > self.poll_interval_secs {
            self.poll_interval_secs = requested;
        }
    }
}
